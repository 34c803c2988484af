//! Proximity gate for the shop and the hospital.
//!
//! Shopping is only available near a mall and exchanging coins for XP only
//! near a hospital. Both use the same check: any venue of the kind within the
//! venue radius unlocks the feature.

use serde::Serialize;
use thiserror::Error;

use crate::catalog::{Catalog, Venue, VenueKind};
use crate::geo::{distance_meters, ProximityRadius};
use crate::location::{LocationError, PositionProvider};

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("{}", not_nearby_message(.kind, .nearest))]
    NotNearby {
        kind: VenueKind,
        nearest: String,
        distance_meters: f64,
    },

    #[error("No {0} venues are configured.")]
    NoVenues(VenueKind),

    #[error(transparent)]
    Location(#[from] LocationError),
}

fn not_nearby_message(kind: &VenueKind, nearest: &str) -> String {
    match kind {
        VenueKind::Mall => format!("Not near a mall. Visit {} to shop.", nearest),
        VenueKind::Hospital => format!(
            "Not near a hospital. Visit {} to exchange coins for XP.",
            nearest
        ),
    }
}

/// Granted access, with the venue that granted it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenueAccess {
    pub venue: Venue,
    pub distance_meters: f64,
}

pub struct VenueGate {
    malls: Vec<Venue>,
    hospitals: Vec<Venue>,
    positions: PositionProvider,
    radius: ProximityRadius,
}

impl VenueGate {
    pub fn new(catalog: &Catalog, positions: PositionProvider, radius: ProximityRadius) -> Self {
        Self {
            malls: catalog.venues(VenueKind::Mall).to_vec(),
            hospitals: catalog.venues(VenueKind::Hospital).to_vec(),
            positions,
            radius,
        }
    }

    fn venues(&self, kind: VenueKind) -> &[Venue] {
        match kind {
            VenueKind::Mall => &self.malls,
            VenueKind::Hospital => &self.hospitals,
        }
    }

    /// Query the position once and find the nearest venue of `kind`.
    pub async fn check(&self, kind: VenueKind) -> Result<VenueAccess, VenueError> {
        let venues = self.venues(kind);
        if venues.is_empty() {
            return Err(VenueError::NoVenues(kind));
        }

        let reading = self.positions.current_position().await?;
        let (venue, distance) = venues
            .iter()
            .map(|v| (v, distance_meters(reading.coordinate, v.coordinate)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or(VenueError::NoVenues(kind))?;

        if distance > self.radius.meters() {
            tracing::info!(
                %kind,
                nearest = %venue.name,
                distance_m = distance,
                "Venue access denied"
            );
            return Err(VenueError::NotNearby {
                kind,
                nearest: venue.name.clone(),
                distance_meters: distance,
            });
        }

        tracing::debug!(%kind, venue = %venue.name, distance_m = distance, "Venue access granted");
        Ok(VenueAccess {
            venue: venue.clone(),
            distance_meters: distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::location::{FixedPositionSource, ScriptedPositionSource};
    use std::sync::Arc;

    const MALL: Coordinate = Coordinate::new(19.1410, 72.8311);
    const HOSPITAL: Coordinate = Coordinate::new(19.1072, 72.8367);

    fn gate_at(position: Coordinate) -> VenueGate {
        let catalog = Catalog::builtin().expect("builtin catalog");
        let source = Arc::new(FixedPositionSource::new(position, 5.0));
        VenueGate::new(
            &catalog,
            PositionProvider::new(source),
            ProximityRadius::VENUE_DEFAULT,
        )
    }

    #[tokio::test]
    async fn test_access_near_venue() {
        let access = gate_at(MALL).check(VenueKind::Mall).await.unwrap();
        assert_eq!(access.venue.name, "Infinity Mall, Andheri");
        assert!(access.distance_meters < 1.0);
    }

    #[tokio::test]
    async fn test_denied_names_nearest_venue() {
        let err = gate_at(MALL).check(VenueKind::Hospital).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Not near a hospital. Visit Cooper Hospital to exchange coins for XP."
        );

        let err = gate_at(HOSPITAL).check(VenueKind::Mall).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Not near a mall. Visit Infinity Mall, Andheri to shop."
        );
    }

    #[tokio::test]
    async fn test_location_error_passes_through() {
        let catalog = Catalog::builtin().unwrap();
        let source = Arc::new(ScriptedPositionSource::new());
        source.push_err(LocationError::PermissionDenied);
        let gate = VenueGate::new(
            &catalog,
            PositionProvider::new(source),
            ProximityRadius::VENUE_DEFAULT,
        );
        assert!(matches!(
            gate.check(VenueKind::Mall).await,
            Err(VenueError::Location(LocationError::PermissionDenied))
        ));
    }

    #[tokio::test]
    async fn test_no_venues_configured() {
        let source = Arc::new(FixedPositionSource::new(MALL, 5.0));
        let gate = VenueGate::new(
            &Catalog::default(),
            PositionProvider::new(source.clone()),
            ProximityRadius::VENUE_DEFAULT,
        );
        assert!(matches!(
            gate.check(VenueKind::Mall).await,
            Err(VenueError::NoVenues(VenueKind::Mall))
        ));
    }
}
