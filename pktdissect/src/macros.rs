macro_rules! enum_sim {
    (
        $(#[$enum_attr: meta])*
        pub struct $tname:ident ($size_t:ty) {
            $(
                $(#[$arm_attr: meta])*
                $enum_arm:ident = $num_exp:expr
            ),+ $(,)?
        }
    ) => {
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
        $(#[$enum_attr])*
        pub struct $tname($size_t);

        impl $tname {
            $(
                $(#[$arm_attr])*
                pub const $enum_arm: Self = Self($num_exp);
            )+

            /// Get the raw value.
            pub const fn raw(&self) -> $size_t {
                self.0
            }

            /// Get the name of the value, if it is one of the well-known constants.
            pub fn name(&self) -> Option<&'static str> {
                $(
                    if self.0 == $num_exp {
                        return Some(stringify!($enum_arm));
                    }
                )+
                None
            }
        }

        impl ::core::convert::From<$size_t> for $tname {
            #[inline]
            fn from(value: $size_t) -> $tname {
                $tname(value)
            }
        }

        impl ::core::convert::From<$tname> for $size_t {
            #[inline]
            fn from(value: $tname) -> $size_t {
                value.0
            }
        }

        impl ::core::fmt::Display for $tname {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                match self.name() {
                    Some(name) => write!(f, "{} ({})", name, self.0),
                    None => write!(f, "unknown ({})", self.0),
                }
            }
        }
    };
}

// Equality and hashing over the memoized wire bytes.
macro_rules! value_eq {
    ($tr:ident: $($tname:ty),+ $(,)?) => {
        $(
            impl ::core::cmp::PartialEq for $tname {
                #[inline]
                fn eq(&self, other: &Self) -> bool {
                    <$tname as $crate::packet::$tr>::raw_bytes(self)
                        == <$tname as $crate::packet::$tr>::raw_bytes(other)
                }
            }

            impl ::core::cmp::Eq for $tname {}

            impl ::core::hash::Hash for $tname {
                #[inline]
                fn hash<H: ::core::hash::Hasher>(&self, state: &mut H) {
                    state.write_u64(<$tname as $crate::packet::$tr>::hash_code(self));
                }
            }
        )+
    };
}

// The object plumbing shared by every `Packet` implementation.
macro_rules! packet_object_methods {
    ($name:expr) => {
        #[inline]
        fn name(&self) -> &'static str {
            $name
        }

        #[inline]
        fn memo(&self) -> &$crate::memo::Memo {
            &self.memo
        }

        #[inline]
        fn as_any(&self) -> &dyn ::core::any::Any {
            self
        }

        #[inline]
        fn clone_packet(&self) -> ::std::boxed::Box<dyn $crate::packet::Packet> {
            ::std::boxed::Box::new(self.clone())
        }
    };
}

// Same as above for `Header` implementations.
macro_rules! header_object_methods {
    ($name:expr) => {
        #[inline]
        fn name(&self) -> &'static str {
            $name
        }

        #[inline]
        fn memo(&self) -> &$crate::memo::Memo {
            &self.memo
        }

        #[inline]
        fn as_any(&self) -> &dyn ::core::any::Any {
            self
        }
    };
}

// Implements `PacketBuilder` for a concrete builder whose inherent
// `build(self)` returns the packet type.
macro_rules! packet_builder {
    ($builder:ty, $name:expr, payload) => {
        impl $crate::builder::PacketBuilder for $builder {
            fn name(&self) -> &'static str {
                $name
            }

            fn build_packet(
                self: ::std::boxed::Box<Self>,
            ) -> Result<::std::boxed::Box<dyn $crate::packet::Packet>, $crate::error::BuildError> {
                Ok(::std::boxed::Box::new((*self).build()?))
            }

            fn payload_builder(&self) -> Option<&dyn $crate::builder::PacketBuilder> {
                self.payload.as_deref()
            }

            fn payload_builder_mut(
                &mut self,
            ) -> Option<&mut (dyn $crate::builder::PacketBuilder + 'static)> {
                self.payload.as_deref_mut()
            }
        }
    };
    ($builder:ty, $name:expr) => {
        impl $crate::builder::PacketBuilder for $builder {
            fn name(&self) -> &'static str {
                $name
            }

            fn build_packet(
                self: ::std::boxed::Box<Self>,
            ) -> Result<::std::boxed::Box<dyn $crate::packet::Packet>, $crate::error::BuildError> {
                Ok(::std::boxed::Box::new((*self).build()?))
            }

            fn payload_builder(&self) -> Option<&dyn $crate::builder::PacketBuilder> {
                None
            }

            fn payload_builder_mut(
                &mut self,
            ) -> Option<&mut (dyn $crate::builder::PacketBuilder + 'static)> {
                None
            }
        }
    };
}
