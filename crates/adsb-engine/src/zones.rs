//! In-memory zone registry.
//!
//! Zones are managed from outside the tick loop (create / update / delete)
//! and read by the core once per tick through `ZoneRegistry`.

use adsb_core::{CoreError, CreateZoneRequest, UpdateZoneRequest, Zone, ZoneRegistry};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryZoneRegistry {
    zones: DashMap<String, Zone>,
}

impl InMemoryZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a new, active zone.
    pub fn create(&self, req: CreateZoneRequest, now: DateTime<Utc>) -> Result<Zone, CoreError> {
        let zone = Zone {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            zone_type: req.zone_type,
            polygon: req.polygon,
            floor_ft: req.floor_ft,
            ceiling_ft: req.ceiling_ft,
            active: true,
            created_at: now,
        };
        check(&zone)?;

        self.zones.insert(zone.id.clone(), zone.clone());
        tracing::info!("Created zone '{}' ({})", zone.name, zone.id);
        Ok(zone)
    }

    /// Insert a zone with a caller-chosen id, replacing any existing one.
    pub fn upsert(&self, zone: Zone) -> Result<Zone, CoreError> {
        check(&zone)?;
        self.zones.insert(zone.id.clone(), zone.clone());
        Ok(zone)
    }

    pub fn update(&self, id: &str, req: UpdateZoneRequest) -> Result<Zone, CoreError> {
        let mut entry = self
            .zones
            .get_mut(id)
            .ok_or_else(|| CoreError::ZoneNotFound(id.to_string()))?;

        let mut updated = entry.clone();
        if let Some(name) = req.name {
            updated.name = name;
        }
        if let Some(zone_type) = req.zone_type {
            updated.zone_type = zone_type;
        }
        if let Some(polygon) = req.polygon {
            updated.polygon = polygon;
        }
        if req.floor_ft.is_some() {
            updated.floor_ft = req.floor_ft;
        }
        if req.ceiling_ft.is_some() {
            updated.ceiling_ft = req.ceiling_ft;
        }
        if let Some(active) = req.active {
            updated.active = active;
        }
        check(&updated)?;

        *entry = updated.clone();
        tracing::info!("Updated zone '{}' ({})", updated.name, updated.id);
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> Result<Zone, CoreError> {
        let (_, zone) = self
            .zones
            .remove(id)
            .ok_or_else(|| CoreError::ZoneNotFound(id.to_string()))?;
        tracing::info!("Deleted zone {}", id);
        Ok(zone)
    }

    pub fn get(&self, id: &str) -> Option<Zone> {
        self.zones.get(id).map(|zone| zone.value().clone())
    }

    /// All zones, active or not, ordered by id.
    pub fn list(&self) -> Vec<Zone> {
        let mut zones: Vec<Zone> = self.zones.iter().map(|zone| zone.value().clone()).collect();
        zones.sort_by(|a, b| a.id.cmp(&b.id));
        zones
    }
}

impl ZoneRegistry for InMemoryZoneRegistry {
    fn list_active_zones(&self) -> Vec<Zone> {
        let mut zones: Vec<Zone> = self
            .zones
            .iter()
            .filter(|zone| zone.active)
            .map(|zone| zone.value().clone())
            .collect();
        zones.sort_by(|a, b| a.id.cmp(&b.id));
        zones
    }
}

fn check(zone: &Zone) -> Result<(), CoreError> {
    let errors = zone.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::InvalidZone(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adsb_core::{GeoPoint, ZoneType};

    fn square() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(55.49, -4.60),
            GeoPoint::new(55.49, -4.58),
            GeoPoint::new(55.51, -4.58),
            GeoPoint::new(55.51, -4.60),
        ]
    }

    fn request() -> CreateZoneRequest {
        CreateZoneRequest {
            name: "Prestwick NFZ".into(),
            zone_type: ZoneType::NoFlyZone,
            polygon: square(),
            floor_ft: None,
            ceiling_ft: None,
        }
    }

    #[test]
    fn zone_crud() {
        let registry = InMemoryZoneRegistry::new();
        let zone = registry.create(request(), Utc::now()).expect("valid zone");
        assert!(zone.active);
        assert_eq!(registry.get(&zone.id).map(|z| z.name), Some("Prestwick NFZ".into()));

        let updated = registry
            .update(
                &zone.id,
                UpdateZoneRequest {
                    active: Some(false),
                    ..UpdateZoneRequest::default()
                },
            )
            .expect("update");
        assert!(!updated.active);
        assert!(registry.list_active_zones().is_empty());
        assert_eq!(registry.list().len(), 1);

        registry.delete(&zone.id).expect("delete");
        assert!(registry.get(&zone.id).is_none());
        assert!(matches!(
            registry.delete(&zone.id),
            Err(CoreError::ZoneNotFound(_))
        ));
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let registry = InMemoryZoneRegistry::new();
        let mut req = request();
        req.polygon.truncate(2);
        assert!(matches!(
            registry.create(req, Utc::now()),
            Err(CoreError::InvalidZone(_))
        ));

        let zone = registry.create(request(), Utc::now()).expect("valid zone");
        let err = registry
            .update(
                &zone.id,
                UpdateZoneRequest {
                    floor_ft: Some(2000.0),
                    ceiling_ft: Some(1000.0),
                    ..UpdateZoneRequest::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidZone(_)));
        // Rejected update leaves the zone untouched.
        assert_eq!(registry.get(&zone.id).and_then(|z| z.floor_ft), None);
    }
}
