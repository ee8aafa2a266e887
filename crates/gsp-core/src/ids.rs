//! Opaque identifier newtypes.
//!
//! All entities are assigned an `i64` identifier by the store on insert.
//! Newtypes prevent accidentally passing a `BatchId` where an `OrderId`
//! is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            #[must_use]
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            #[must_use]
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(BatchId);
id_type!(OrderId);
id_type!(OrderProductId);
id_type!(OrderLogId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_inner_value() {
        assert_eq!(BatchId::new(42).to_string(), "42");
    }

    #[test]
    fn distinct_id_types_do_not_mix() {
        let batch = BatchId::new(1);
        let order = OrderId::new(1);
        assert_eq!(batch.get(), order.get());
        // but the types themselves are distinct at compile time
    }
}
