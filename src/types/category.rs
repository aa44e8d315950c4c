//! Categorical vocabularies shared by generation, preprocessing and scoring

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Label that is not part of a field's vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{value}` is not a valid {field}")]
pub struct UnknownCategory {
    pub field: &'static str,
    pub value: String,
}

/// Common interface of every categorical field.
pub trait Categorical: Copy + Sized + 'static {
    /// Column name of the field
    const FIELD: &'static str;

    /// Every value, in generation order
    fn all() -> &'static [Self];

    /// Vocabulary label
    fn as_str(self) -> &'static str;

    /// Vocabulary labels in generation order
    fn labels() -> Vec<&'static str> {
        Self::all().iter().map(|c| c.as_str()).collect()
    }
}

macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl Categorical for $name {
            const FIELD: &'static str = $field;

            fn all() -> &'static [Self] {
                Self::ALL
            }

            fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownCategory;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($label => Ok($name::$variant),)+
                    other => Err(UnknownCategory {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

categorical! {
    /// Merchant category of the purchase
    MerchantCategory, "merchant_category" {
        Grocery => "grocery",
        Gas => "gas",
        Restaurant => "restaurant",
        OnlineRetail => "online_retail",
        Atm => "atm",
    }
}

categorical! {
    /// Operating system of the initiating device
    DeviceOs, "device_os" {
        Ios => "iOS",
        Android => "Android",
        Windows => "Windows",
        MacOs => "macOS",
        Linux => "Linux",
        ChromeOs => "ChromeOS",
    }
}

categorical! {
    /// Device locale
    DeviceLang, "device_lang" {
        EnUs => "en-US",
        EsUs => "es-US",
        FrUs => "fr-US",
        ZhCn => "zh-CN",
    }
}

categorical! {
    /// Country the request IP geolocates to
    IpCountry, "ip_country" {
        Us => "US",
        Ca => "CA",
        Ru => "RU",
        Cn => "CN",
        Kp => "KP",
        Ir => "IR",
        Ve => "VE",
        Br => "BR",
        In => "IN",
    }
}

categorical! {
    /// Network provider of the request IP
    IpIsp, "ip_isp" {
        Comcast => "comcast",
        Verizon => "verizon",
        Aws => "aws",
        Azure => "azure",
        ChinaTelecom => "china_telecom",
    }
}

impl IpCountry {
    /// Countries flagged as high risk
    pub const RISKY: &'static [IpCountry] = &[
        IpCountry::Ru,
        IpCountry::Cn,
        IpCountry::Kp,
        IpCountry::Ir,
        IpCountry::Ve,
    ];

    pub fn is_foreign(self) -> bool {
        self != IpCountry::Us
    }

    pub fn is_risky(self) -> bool {
        Self::RISKY.contains(&self)
    }
}

impl DeviceOs {
    pub fn is_uncommon(self) -> bool {
        matches!(self, DeviceOs::Linux | DeviceOs::ChromeOs)
    }
}
