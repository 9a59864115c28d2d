// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros shared by the record modules.
//!
//! - [`define_id!`] integer newtype ids for store rows
//! - [`simple_display!`] `Display` for status enums with fixed labels
//! - [`builder!`] test builders for store rows
//! - [`setters!`] chained setters for config structs

/// Define a newtype id over the integer primary key of a store row.
///
/// ```ignore
/// define_id! {
///     /// Primary key of a host row.
///     pub struct HostId;
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

/// `Display` for status enums whose labels are what operators see in
/// notifications and logs (`"Repair Failed"`, `"NO_PROTECTION"`).
#[macro_export]
macro_rules! simple_display {
    ($enum:ty { $( $variant:ident => $label:literal ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let label = match self {
                    $( Self::$variant => $label, )+
                };
                f.write_str(label)
            }
        }
    };
}

/// Test builder for a store row: `Row::builder()` starts from the listed
/// defaults, each field gets a chained setter, `build()` yields the row.
///
/// Fields under `into` take `impl Into<T>`; fields under `set` take `T`.
/// Only compiled for tests and the `test-support` feature.
#[macro_export]
macro_rules! builder {
    (
        pub struct $builder:ident => $row:ident {
            $(into {
                $( $into_field:ident : $into_ty:ty = $into_default:expr ),* $(,)?
            })?
            $(set {
                $( $set_field:ident : $set_ty:ty = $set_default:expr ),* $(,)?
            })?
        }
    ) => {
        #[cfg(any(test, feature = "test-support"))]
        pub struct $builder {
            row: $row,
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $builder {
            $($(
                pub fn $into_field(mut self, value: impl Into<$into_ty>) -> Self {
                    self.row.$into_field = value.into();
                    self
                }
            )*)?
            $($(
                pub fn $set_field(mut self, value: $set_ty) -> Self {
                    self.row.$set_field = value;
                    self
                }
            )*)?

            pub fn build(self) -> $row {
                self.row
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $row {
            pub fn builder() -> $builder {
                $builder {
                    row: $row {
                        $($( $into_field: $into_default.into(), )*)?
                        $($( $set_field: $set_default, )*)?
                    },
                }
            }
        }
    };
}

/// Generate chained setter methods inside an existing `impl` block.
#[macro_export]
macro_rules! setters {
    (
        $(into {
            $( $into_field:ident : $into_ty:ty ),* $(,)?
        })?
        $(set {
            $( $set_field:ident : $set_ty:ty ),* $(,)?
        })?
    ) => {
        $($(
            pub fn $into_field(mut self, v: impl Into<$into_ty>) -> Self {
                self.$into_field = v.into();
                self
            }
        )*)?

        $($(
            pub fn $set_field(mut self, v: $set_ty) -> Self {
                self.$set_field = v;
                self
            }
        )*)?
    };
}
