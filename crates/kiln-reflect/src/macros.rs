//! Declarative registration macros.

/// Describe one field of a struct, with accessors.
///
/// ```
/// use kiln_reflect::{field, FieldKind};
///
/// struct Light {
///     intensity: f32,
/// }
///
/// let desc = field!(Light, intensity);
/// assert_eq!(desc.kind, FieldKind::FloatingPoint);
/// assert_eq!(desc.size, 4);
/// ```
#[macro_export]
macro_rules! field {
    ($owner:ty, $field:ident) => {{
        fn get(obj: &dyn ::std::any::Any) -> ::std::option::Option<&dyn $crate::DynValue> {
            obj.downcast_ref::<$owner>()
                .map(|o| &o.$field as &dyn $crate::DynValue)
        }

        fn get_mut(
            obj: &mut dyn ::std::any::Any,
        ) -> ::std::option::Option<&mut dyn $crate::DynValue> {
            obj.downcast_mut::<$owner>()
                .map(|o| &mut o.$field as &mut dyn $crate::DynValue)
        }

        $crate::FieldDescriptor::of(
            ::std::option::Option::None::<&$owner>.map(|o| &o.$field),
            ::std::mem::offset_of!($owner, $field),
            $crate::FieldAccessors { get, get_mut },
        )
    }};
}

/// Declare a reflected enum with explicit member values.
///
/// ```
/// use kiln_reflect::{reflect_enum, ReflectedEnum};
///
/// reflect_enum! {
///     pub enum Channel: u8 {
///         Red = 0,
///         Green = 1,
///     }
/// }
///
/// assert_eq!(Channel::descriptor().value_of("Green"), Some(1));
/// ```
#[macro_export]
macro_rules! reflect_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr($repr)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value ),*
        }

        impl $crate::ReflectedEnum for $name {
            fn descriptor() -> &'static $crate::EnumDescriptor {
                static DESCRIPTOR: ::std::sync::OnceLock<$crate::EnumDescriptor> =
                    ::std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    $crate::EnumDescriptor::new(
                        stringify!($name),
                        &[$((stringify!($variant), $name::$variant as u64)),*],
                    )
                })
            }

            fn to_value(self) -> u64 {
                self as u64
            }

            fn from_value(value: u64) -> ::std::option::Option<Self> {
                $(
                    if value == $name::$variant as u64 {
                        return ::std::option::Option::Some($name::$variant);
                    }
                )*
                ::std::option::Option::None
            }
        }

        impl $crate::DynValue for $name {
            fn to_text(&self) -> ::std::string::String {
                $crate::enum_to_text(*self)
            }

            fn set_text(&mut self, text: &str) -> $crate::Result<()> {
                *self = $crate::enum_from_text(text)?;
                Ok(())
            }

            $crate::__impl_any!();
        }

        impl $crate::FieldValue for $name {
            const KIND: $crate::FieldKind = $crate::FieldKind::Enum;

            fn type_hash() -> u32 {
                <$name as $crate::ReflectedEnum>::descriptor().hash.raw()
            }
        }
    };
}

/// Implement reflection for a struct.
///
/// Each field may carry an alias (`as "alias"`) and a one or two part
/// description (`=> ["part1", "part2"]`).
///
/// ```
/// use kiln_reflect::{reflect_class, Reflected, ReflectedRef};
///
/// #[derive(Default)]
/// struct Emitter {
///     radius: f32,
///     samples: u32,
/// }
///
/// reflect_class! {
///     Emitter {
///         radius as "r" => ["Radius", "world units"],
///         samples,
///     }
/// }
///
/// let emitter = Emitter { radius: 2.5, samples: 16 };
/// let view = ReflectedRef::new(&emitter);
/// assert_eq!(view.value(0).unwrap(), "2.5");
/// assert_eq!(Emitter::class().alias(0), Some("r"));
/// ```
#[macro_export]
macro_rules! reflect_class {
    (
        $ty:ident {
            $( $field:ident $(as $alias:literal)? $(=> [$d1:literal $(, $d2:literal)?])? ),* $(,)?
        }
    ) => {
        impl $crate::Reflected for $ty {
            fn class() -> &'static $crate::ClassDescriptor {
                static CLASS: ::std::sync::OnceLock<$crate::ClassDescriptor> =
                    ::std::sync::OnceLock::new();
                CLASS.get_or_init(|| {
                    $crate::ClassDescriptor::builder(stringify!($ty))
                        $(
                            .field($crate::field!($ty, $field), stringify!($field))
                            $(.alias($alias))?
                            $(.description(($d1 $(, $d2)?)))?
                        )*
                        .build()
                })
            }
        }

        impl $crate::DynValue for $ty {
            fn to_text(&self) -> ::std::string::String {
                ::std::string::String::new()
            }

            fn set_text(&mut self, _text: &str) -> $crate::Result<()> {
                Err($crate::Error::NotValueConvertible($crate::FieldKind::Class))
            }

            $crate::__impl_any!();
        }

        impl $crate::FieldValue for $ty {
            const KIND: $crate::FieldKind = $crate::FieldKind::Class;

            fn type_hash() -> u32 {
                <$ty as $crate::Reflected>::class().class_hash.raw()
            }
        }
    };
}
