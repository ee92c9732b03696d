//! Parsing de direcciones libres
//!
//! Las move requests guardan direcciones como texto libre con el formato
//! `"street, city zip"`. El historial de movimientos necesita los componentes
//! por separado; si el texto no sigue el formato, se degrada sin fallar.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref CITY_ZIP: Regex = Regex::new(r"^(?P<city>.*?)\s*(?P<zip>\d{4,6}(?:-\d{4})?)$")
        .expect("valid city/zip regex");
}

/// Componentes estructurados de una dirección
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressParts {
    pub street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

impl AddressParts {
    /// Parsear `"street, city zip"`.
    ///
    /// Solo la última coma separa calle de ciudad, así que calles con comas
    /// internas (`"Unit 4, 12 Main St, Springfield 12345"`) conservan su texto.
    /// Devuelve `complete = false` cuando falta ciudad o código postal.
    pub fn parse(raw: &str) -> (Self, bool) {
        let raw = raw.trim();
        if raw.is_empty() {
            return (Self::default(), false);
        }

        let Some((street, rest)) = raw.rsplit_once(',') else {
            return (
                Self {
                    street: Some(raw.to_string()),
                    ..Self::default()
                },
                false,
            );
        };

        let street = non_empty(street);
        let rest = rest.trim();

        match CITY_ZIP.captures(rest) {
            Some(caps) => {
                let city = caps.name("city").and_then(|m| non_empty(m.as_str()));
                let zip = caps.name("zip").and_then(|m| non_empty(m.as_str()));
                let complete = street.is_some() && city.is_some() && zip.is_some();
                (Self { street, city, zip }, complete)
            }
            None => (
                Self {
                    street,
                    city: non_empty(rest),
                    zip: None,
                },
                false,
            ),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
