//! Defines helper macros for generating domain port error enums.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Constructor coverage for generated port errors.
    define_port_error! {
        pub enum StoragePortError {
            Unavailable { message: String } => "storage unavailable: {message}",
            Rejected { status: u16 } => "rejected with status {status}",
            Partial { message: String, status: u16 } => "partial: {message} ({status})",
            Missing => "nothing stored",
        }
    }

    #[test]
    fn constructors_accept_str_for_string_fields() {
        let err = StoragePortError::unavailable("disk full");
        assert_eq!(err.to_string(), "storage unavailable: disk full");
    }

    #[test]
    fn constructors_preserve_non_string_types() {
        let err = StoragePortError::rejected(401_u16);
        assert_eq!(err.to_string(), "rejected with status 401");
    }

    #[test]
    fn constructors_support_mixed_fields() {
        let err = StoragePortError::partial("half written", 500_u16);
        assert_eq!(err.to_string(), "partial: half written (500)");
    }

    #[test]
    fn unit_variants_get_constructors() {
        assert_eq!(StoragePortError::missing(), StoragePortError::Missing);
    }
}
