use clap::ValueEnum;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Display language of status labels and of the rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum Language {
    #[default]
    Es,
    En,
}

impl Language {
    pub fn tag(self) -> &'static str {
        match self {
            Language::Es => "es",
            Language::En => "en",
        }
    }

    /// BCP 47 tag written into the document catalog.
    pub fn pdf_lang(self) -> &'static str {
        match self {
            Language::Es => "es-ES",
            Language::En => "en-US",
        }
    }
}

/// Shipment lifecycle stage. Each stage is written as a single letter in
/// the source sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusCode {
    Reserve,
    Documentation,
    AwaitingDeparture,
    SwitchInstructions,
    InTransit,
    InTransitWithoutRelease,
    AtDestination,
    EmptyNotReturned,
}

impl StatusCode {
    /// Menu order.
    pub const ALL: [StatusCode; 8] = [
        StatusCode::Reserve,
        StatusCode::Documentation,
        StatusCode::AwaitingDeparture,
        StatusCode::SwitchInstructions,
        StatusCode::InTransit,
        StatusCode::InTransitWithoutRelease,
        StatusCode::AtDestination,
        StatusCode::EmptyNotReturned,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Reserve => "R",
            StatusCode::Documentation => "C",
            StatusCode::AwaitingDeparture => "Z",
            StatusCode::SwitchInstructions => "S",
            StatusCode::InTransit => "T",
            StatusCode::InTransitWithoutRelease => "L",
            StatusCode::AtDestination => "P",
            StatusCode::EmptyNotReturned => "D",
        }
    }

    pub fn label(self, lang: Language) -> &'static str {
        match (self, lang) {
            (StatusCode::Reserve, Language::Es) => "GESTIÓN DE RESERVA",
            (StatusCode::Reserve, Language::En) => "RESERVE MANAGEMENT",
            (StatusCode::Documentation, Language::Es) => "EMBARQUE EN DOCUMENTACIÓN",
            (StatusCode::Documentation, Language::En) => "SHIPPING DOCUMENTATION",
            (StatusCode::AwaitingDeparture, Language::Es) => "EN ESPERA DE SALIDA",
            (StatusCode::AwaitingDeparture, Language::En) => "WAITING FOR DEPARTURE",
            (StatusCode::SwitchInstructions, Language::Es) => "ENVIAR INSTRUCCIONES DE SWITCH",
            (StatusCode::SwitchInstructions, Language::En) => "SEND SWITCH INSTRUCTIONS",
            (StatusCode::InTransit, Language::Es) => "CARGA EN TRANSITO",
            (StatusCode::InTransit, Language::En) => "CARGO IN TRANSIT",
            (StatusCode::InTransitWithoutRelease, Language::Es) => {
                "CARGA EN TRANSITO Y SIN ORDEN DE LIBERACIÓN"
            }
            (StatusCode::InTransitWithoutRelease, Language::En) => {
                "CARGO IN TRANSIT AND WITHOUT RELEASE ORDER"
            }
            (StatusCode::AtDestination, Language::Es) => "CARGA EN DESTINO | CONTENEDOR NO RETIRADO",
            (StatusCode::AtDestination, Language::En) => {
                "LOAD AT DESTINATION | CONTAINER NOT PICKED UP"
            }
            (StatusCode::EmptyNotReturned, Language::Es) => "CONTENEDOR VACIO NO RETORNADO",
            (StatusCode::EmptyNotReturned, Language::En) => "EMPTY CONTAINER NOT RETURNED",
        }
    }

    /// `"T - CARGO IN TRANSIT"`, as shown in selection menus.
    pub fn option_label(self, lang: Language) -> String {
        format!("{} - {}", self.as_str(), self.label(lang))
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        StatusCode::ALL
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown status code '{s}' (expected one of R, C, Z, S, T, L, P, D)"))
    }
}

/// Resolves a raw STATUS value to its code. The value may be the code
/// itself or a label in either language, compared case-insensitively.
/// Blank and unrecognized values give `None`.
pub fn detect_status_code(value: &str) -> Option<StatusCode> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(code) = StatusCode::ALL.into_iter().find(|code| code.as_str() == value) {
        return Some(code);
    }
    let upper = value.to_uppercase();
    StatusCode::ALL.into_iter().find(|code| {
        [Language::Es, Language::En]
            .into_iter()
            .any(|lang| code.label(lang) == upper)
    })
}

/// Label of `value` in `lang`; unrecognized values pass through unchanged.
pub fn translate_status(value: &str, lang: Language) -> Cow<'_, str> {
    match detect_status_code(value) {
        Some(code) => Cow::Borrowed(code.label(lang)),
        None => Cow::Borrowed(value),
    }
}
