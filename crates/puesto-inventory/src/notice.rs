//! # User-Facing Notices
//!
//! Alerts the counter screen shows as dialogs. Published on a broadcast
//! channel by the coordinator; a device with no screen attached simply has
//! no receivers.

use puesto_core::Location;
use serde::Serialize;

/// Capacity of the notice channel.
pub const NOTICE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notice {
    /// A sale or transfer asked for more units than the mirror shows.
    #[serde(rename_all = "camelCase")]
    InsufficientStock {
        product_id: String,
        product_name: String,
        location: Location,
        available: i64,
        requested: i64,
    },

    /// The day was closed with no units left at either location.
    InventoryExhausted,
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self {
            Notice::InsufficientStock { .. } => "Stock insuficiente",
            Notice::InventoryExhausted => "Inventario agotado",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notice::InsufficientStock {
                product_name,
                location,
                available,
                ..
            } => format!(
                "Solo quedan {} unidades de {} en el Punto {}.",
                available, product_name, location
            ),
            Notice::InventoryExhausted => {
                "Se vendió todo el inventario. Registra el stock inicial para el siguiente día."
                    .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let notice = Notice::InsufficientStock {
            product_id: "chapata".into(),
            product_name: "Chapata".into(),
            location: Location::B,
            available: 2,
            requested: 3,
        };
        assert_eq!(notice.title(), "Stock insuficiente");
        assert_eq!(
            notice.message(),
            "Solo quedan 2 unidades de Chapata en el Punto B."
        );

        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["kind"], "insufficientStock");
        assert_eq!(json["productName"], "Chapata");
    }
}
