//! Plate / VIN extraction and vehicle lookup.
//!
//! Extraction is simulated: identifiers are derived from a hash of the photo,
//! so the same photo always reads the same way. Lookups fail for plates
//! ending in "9" and VINs ending in "Z".

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::LookupError;
use crate::model::{Confidence, Photo, Vehicle};
use crate::seed::hash_str;

pub const VIN_LENGTH: usize = 17;

const PLATE_LETTERS: &[u8] = b"ABCDEFGHJKLMNPRSTUVWXYZ";
const VIN_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPRSTUVWXYZ0123456789";
const STATES: [&str; 8] = ["CA", "NY", "TX", "FL", "WA", "IL", "CO", "AZ"];

/// (year, make, model, body type)
const REFERENCE_VEHICLES: [(u16, &str, &str, &str); 8] = [
    (2021, "Toyota", "Camry", "sedan"),
    (2019, "Ford", "F-150", "truck"),
    (2023, "Tesla", "Model 3", "EV"),
    (2018, "Subaru", "Outback", "wagon"),
    (2022, "Honda", "CR-V", "suv"),
    (2020, "BMW", "X5", "luxury suv"),
    (2017, "Chevrolet", "Silverado", "pickup"),
    (2024, "Hyundai", "Ioniq 5", "electric suv"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateExtraction {
    pub plate: String,
    pub state: Option<String>,
    pub confidence: Confidence,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VinExtraction {
    pub vin: String,
    pub confidence: Confidence,
    pub notes: String,
}

fn photo_hash(photo: &Photo) -> u32 {
    hash_str(&format!("{}|{}", photo.name, photo.url))
}

fn pick(alphabet: &[u8], value: u32) -> char {
    char::from(alphabet[value as usize % alphabet.len()])
}

fn read_confidence(hash: u32) -> Confidence {
    Confidence::from_percent(f64::from(70 + hash % 26))
}

pub fn plate_from_photo(photo: &Photo) -> PlateExtraction {
    let hash = photo_hash(photo);
    let letters: String = (0..3).map(|i| pick(PLATE_LETTERS, hash >> (i * 5))).collect();
    let digits = format!("{:04}", (hash >> 7) % 10_000);
    let state = (hash % 5 != 0).then(|| STATES[(hash >> 3) as usize % STATES.len()].to_string());
    let confidence = read_confidence(hash);

    let notes = match &state {
        Some(state) => format!("Plate read from {} with {} state", photo.name, state),
        None => format!("Plate read from {}; state not legible", photo.name),
    };
    PlateExtraction {
        plate: format!("{letters}{digits}"),
        state,
        confidence,
        notes,
    }
}

pub fn vin_from_photo(photo: &Photo) -> VinExtraction {
    let mut hash = photo_hash(photo);
    let mut vin = String::with_capacity(VIN_LENGTH);
    for i in 0..VIN_LENGTH {
        vin.push(pick(VIN_ALPHABET, hash));
        hash = hash_str(&format!("{hash}:{i}"));
    }
    let confidence = read_confidence(photo_hash(photo) >> 4);
    VinExtraction {
        vin,
        confidence,
        notes: format!("VIN plate read from {}", photo.name),
    }
}

fn normalize_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn looks_like_vin(identifier: &str) -> bool {
    identifier.len() == VIN_LENGTH
}

/// Resolves a plate or VIN against the reference vehicle table.
pub fn resolve_vehicle(identifier: &str, state: Option<&str>) -> Result<Vehicle, LookupError> {
    let identifier = normalize_identifier(identifier);
    if identifier.is_empty() {
        return Err(LookupError::EmptyIdentifier);
    }

    if looks_like_vin(&identifier) {
        if identifier.ends_with('Z') {
            return Err(LookupError::VinNotFound(identifier));
        }
    } else if identifier.ends_with('9') {
        return Err(LookupError::PlateNotFound {
            plate: identifier,
            state: state.map(str::to_string),
        });
    }

    let key = match state {
        Some(state) if !looks_like_vin(&identifier) => {
            format!("{identifier}|{}", state.to_uppercase())
        }
        _ => identifier,
    };
    let (year, make, model, body_type) =
        REFERENCE_VEHICLES[hash_str(&key) as usize % REFERENCE_VEHICLES.len()];
    Ok(Vehicle {
        body_type: Some(body_type.to_string()),
        ..Vehicle::new(year, make, model)
    })
}

/// Async front for extraction and lookup with simulated latency.
#[derive(Debug, Clone)]
pub struct VehicleIdentifier {
    latency: Duration,
}

impl VehicleIdentifier {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    pub fn immediate() -> Self {
        Self::new(Duration::ZERO)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    pub async fn extract_plate_and_state(&self, photo: &Photo) -> PlateExtraction {
        self.delay().await;
        plate_from_photo(photo)
    }

    pub async fn extract_vin(&self, photo: &Photo) -> VinExtraction {
        self.delay().await;
        vin_from_photo(photo)
    }

    pub async fn lookup_vehicle(
        &self,
        identifier: &str,
        state: Option<&str>,
    ) -> Result<Vehicle, LookupError> {
        self.delay().await;
        match resolve_vehicle(identifier, state) {
            Ok(vehicle) => {
                info!(vehicle = %vehicle.display_name(), "Vehicle lookup matched");
                Ok(vehicle)
            }
            Err(e) => {
                warn!(error = %e, "Vehicle lookup failed");
                Err(e)
            }
        }
    }
}

impl Default for VehicleIdentifier {
    fn default() -> Self {
        Self::immediate()
    }
}
