//! Church hierarchy records: zones contain areas, areas contain parishes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub address: String,
    /// Owning zone id
    #[serde(default)]
    pub zone: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parish {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub address: String,
    /// Owning area id
    #[serde(default)]
    pub area: Option<i64>,
}

/// All three levels of the hierarchy, fetched together.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    pub zones: Vec<Zone>,
    pub areas: Vec<Area>,
    pub parishes: Vec<Parish>,
}

impl Hierarchy {
    pub fn areas_in(&self, zone_id: i64) -> impl Iterator<Item = &Area> {
        self.areas.iter().filter(move |a| a.zone == Some(zone_id))
    }

    pub fn parishes_in(&self, area_id: i64) -> impl Iterator<Item = &Parish> {
        self.parishes.iter().filter(move |p| p.area == Some(area_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_records_omit_id() {
        let zone = Zone {
            name: "Zone A".to_string(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&zone).unwrap(),
            serde_json::json!({"name": "Zone A", "address": ""})
        );
    }

    #[test]
    fn test_hierarchy_lookup() {
        let hierarchy = Hierarchy {
            zones: vec![],
            areas: vec![
                Area { id: Some(1), name: "North".into(), zone: Some(10), ..Default::default() },
                Area { id: Some(2), name: "South".into(), zone: Some(11), ..Default::default() },
            ],
            parishes: vec![
                Parish { id: Some(5), name: "Grace".into(), area: Some(1), ..Default::default() },
            ],
        };
        let names: Vec<&str> = hierarchy.areas_in(10).map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["North"]);
        assert_eq!(hierarchy.parishes_in(1).count(), 1);
        assert_eq!(hierarchy.parishes_in(2).count(), 0);
    }
}
