use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertTarget {
    Sector,
    Head,
    Pump,
    Other,
}

impl AlertTarget {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sector" => Self::Sector,
            "head" | "cabezal" => Self::Head,
            "pump" | "bomba" => Self::Pump,
            _ => Self::Other,
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            Self::Sector => "Sector",
            Self::Head => "Head",
            Self::Pump => "Pump",
            Self::Other => "Element",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAlert {
    pub id: i64,
    pub target_kind: AlertTarget,
    pub target_id: Option<i64>,
    pub level: String,
    pub reason: String,
}

impl OpenAlert {
    pub fn label(&self) -> String {
        let target = match self.target_id {
            Some(id) => format!("{} {id}", self.target_kind.noun()),
            None => self.target_kind.noun().to_owned(),
        };
        format!("[#{}] {target} · {}", self.id, self.level.to_uppercase())
    }

    /// Sector and head ids for the maintenance record; other targets carry none.
    pub fn maintenance_target(&self) -> (Option<i64>, Option<i64>) {
        match self.target_kind {
            AlertTarget::Sector => (self.target_id, None),
            AlertTarget::Head => (None, self.target_id),
            AlertTarget::Pump | AlertTarget::Other => (None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AlertTarget, OpenAlert};

    fn alert(kind: AlertTarget, target_id: Option<i64>) -> OpenAlert {
        OpenAlert {
            id: 31,
            target_kind: kind,
            target_id,
            level: "rojo".to_owned(),
            reason: "presión final baja".to_owned(),
        }
    }

    #[test]
    fn label_names_alert_target_and_level() {
        assert_eq!(alert(AlertTarget::Sector, Some(4)).label(), "[#31] Sector 4 · ROJO");
        assert_eq!(alert(AlertTarget::Other, None).label(), "[#31] Element · ROJO");
    }

    #[test]
    fn target_kind_parses_both_vocabularies() {
        assert_eq!(AlertTarget::parse("Cabezal"), AlertTarget::Head);
        assert_eq!(AlertTarget::parse("head"), AlertTarget::Head);
        assert_eq!(AlertTarget::parse("bomba"), AlertTarget::Pump);
        assert_eq!(AlertTarget::parse("riego"), AlertTarget::Other);
    }

    #[test]
    fn maintenance_target_follows_kind() {
        assert_eq!(alert(AlertTarget::Sector, Some(4)).maintenance_target(), (Some(4), None));
        assert_eq!(alert(AlertTarget::Head, Some(2)).maintenance_target(), (None, Some(2)));
        assert_eq!(alert(AlertTarget::Pump, Some(1)).maintenance_target(), (None, None));
    }
}
