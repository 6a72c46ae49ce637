/// A macro which defines an enum type with a fallback `Unknown` variant, so
/// that any value seen on (or pushed onto) the wire stays representable.
macro_rules! enum_builder {
    (
    $(#[$comment:meta])*
    @U8
        EnumName: $enum_name: ident;
        EnumVal { $( $enum_var: ident => $enum_val: literal ),* $(,)? }
    ) => {
        $(#[$comment])*
        #[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
        pub enum $enum_name {
            $( $enum_var),*
            ,Unknown(u8)
        }

        impl $enum_name {
            pub fn get_u8(&self) -> u8 {
                match *self {
                    $( $enum_name::$enum_var => $enum_val),*
                    ,$enum_name::Unknown(x) => x
                }
            }
        }

        impl $crate::codec::Codec for $enum_name {
            fn encode(&self, bytes: &mut Vec<u8>) {
                $crate::codec::Codec::encode(&self.get_u8(), bytes);
            }

            fn read(r: &mut $crate::codec::Reader) -> Option<Self> {
                <u8 as $crate::codec::Codec>::read(r).map($enum_name::from)
            }
        }

        impl From<u8> for $enum_name {
            fn from(x: u8) -> Self {
                match x {
                    $($enum_val => $enum_name::$enum_var),*
                    , x => $enum_name::Unknown(x),
                }
            }
        }
    };
    (
    $(#[$comment:meta])*
    @U16
        EnumName: $enum_name: ident;
        EnumVal { $( $enum_var: ident => $enum_val: literal ),* $(,)? }
    ) => {
        $(#[$comment])*
        #[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
        pub enum $enum_name {
            $( $enum_var),*
            ,Unknown(u16)
        }

        impl $enum_name {
            pub fn get_u16(&self) -> u16 {
                match *self {
                    $( $enum_name::$enum_var => $enum_val),*
                    ,$enum_name::Unknown(x) => x
                }
            }
        }

        impl $crate::codec::Codec for $enum_name {
            fn encode(&self, bytes: &mut Vec<u8>) {
                $crate::codec::Codec::encode(&self.get_u16(), bytes);
            }

            fn read(r: &mut $crate::codec::Reader) -> Option<Self> {
                <u16 as $crate::codec::Codec>::read(r).map($enum_name::from)
            }
        }

        impl From<u16> for $enum_name {
            fn from(x: u16) -> Self {
                match x {
                    $($enum_val => $enum_name::$enum_var),*
                    , x => $enum_name::Unknown(x),
                }
            }
        }
    };
}
