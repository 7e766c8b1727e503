//! Generated requests standing in for a live intake feed.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{RequestSource, station_email};
use crate::config::DeskConfig;
use crate::domain::provider::ServiceProvider;
use crate::request::{CsrRequest, RequestId, RequestStatus, Timestamps};

/// Police stations requests are raised from.
pub const STATIONS: [&str; 5] = [
    "Chennai Central Police Station",
    "Coimbatore North Police Station",
    "Madurai East Police Station",
    "Trichy West Police Station",
    "Salem South Police Station",
];

/// Share of generated requests that still await dispatch.
const PENDING_RATIO: f64 = 0.7;

const CANNED_RESPONSE: &str =
    "Subscriber details: Name: John Doe, Address: Chennai, Last activity: 2024-01-15";

const REFERENCE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random request generator.
///
/// Roughly 70% of requests are generated awaiting dispatch and the rest with a
/// provider response already attached. Seeded generators are reproducible
/// apart from IDs and timestamps, which are relative to the current time.
pub struct FixtureGenerator {
    rng: StdRng,
    count: usize,
    email_domain: String,
    drained: bool,
}

impl FixtureGenerator {
    pub fn new(count: usize, email_domain: impl Into<String>) -> Self {
        Self::with_rng(StdRng::from_entropy(), count, email_domain)
    }

    pub fn with_seed(seed: u64, count: usize, email_domain: impl Into<String>) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), count, email_domain)
    }

    pub fn from_config(config: &DeskConfig) -> Self {
        Self::new(config.fixture_count, config.email_domain.clone())
    }

    fn with_rng(rng: StdRng, count: usize, email_domain: impl Into<String>) -> Self {
        Self {
            rng,
            count,
            email_domain: email_domain.into(),
            drained: false,
        }
    }

    /// Generate a fresh batch of `count` requests.
    pub fn generate(&mut self) -> Vec<CsrRequest> {
        let now = Utc::now();
        (0..self.count).map(|_| self.generate_one(now)).collect()
    }

    fn generate_one(&mut self, now: DateTime<Utc>) -> CsrRequest {
        let station = *STATIONS.choose(&mut self.rng).unwrap_or(&STATIONS[0]);
        let provider = *ServiceProvider::ALL
            .choose(&mut self.rng)
            .unwrap_or(&ServiceProvider::Jio);
        let mobile_number = format!(
            "{}{}",
            self.rng.gen_range(100..1000),
            self.rng.gen_range(1_000_000..10_000_000)
        );

        let age_ms = self.rng.gen_range(0..24 * 60 * 60 * 1000);
        let received = now - Duration::milliseconds(age_ms);

        let mut record = CsrRequest {
            id: RequestId::generate(),
            police_station_email: station_email(station, &self.email_domain),
            police_station_name: station.to_string(),
            mobile_number,
            service_provider: provider,
            status: RequestStatus::RequestReceived,
            timestamps: Timestamps {
                received,
                sent_to_provider: None,
                response_received: None,
                forwarded: None,
            },
            reference_id: self.reference_id(),
            provider_response: None,
        };

        if !self.rng.gen_bool(PENDING_RATIO) {
            // Place both stamps between receipt and now, in order
            let sent = received + Duration::milliseconds(self.rng.gen_range(0..=age_ms));
            let remaining = (now - sent).num_milliseconds();
            let responded = sent + Duration::milliseconds(self.rng.gen_range(0..=remaining));

            record.status = RequestStatus::ResponseReceived;
            record.timestamps.sent_to_provider = Some(sent);
            record.timestamps.response_received = Some(responded);
            record.provider_response = Some(CANNED_RESPONSE.to_string());
        }

        record
    }

    fn reference_id(&mut self) -> String {
        let suffix: String = (0..9)
            .map(|_| {
                let i = self.rng.gen_range(0..REFERENCE_ALPHABET.len());
                REFERENCE_ALPHABET[i] as char
            })
            .collect();
        format!("REF-{}", suffix)
    }
}

/// Yields a single generated batch, then reports the feed as drained.
impl RequestSource for FixtureGenerator {
    fn next_batch(&mut self) -> Vec<CsrRequest> {
        if self.drained {
            return Vec::new();
        }
        self.drained = true;
        self.generate()
    }
}

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}

/// The three provider responses the review screen is seeded with.
pub fn review_fixtures(email_domain: &str) -> Vec<CsrRequest> {
    let fixture = |id: &str,
                   station: &str,
                   mobile: &str,
                   provider: ServiceProvider,
                   stamps: [DateTime<Utc>; 3],
                   response: &str| CsrRequest {
        id: RequestId::from(id),
        police_station_email: station_email(station, email_domain),
        police_station_name: station.to_string(),
        mobile_number: mobile.to_string(),
        service_provider: provider,
        status: RequestStatus::ResponseReceived,
        timestamps: Timestamps {
            received: stamps[0],
            sent_to_provider: Some(stamps[1]),
            response_received: Some(stamps[2]),
            forwarded: None,
        },
        reference_id: format!("REF-{}-{}", provider.code(), &id[4..]),
        provider_response: Some(response.to_string()),
    };

    vec![
        fixture(
            "CSR-001",
            STATIONS[0],
            "9876543210",
            ServiceProvider::Jio,
            [at(2024, 1, 15, 9, 0), at(2024, 1, 15, 10, 30), at(2024, 1, 15, 14, 45)],
            "Subscriber Details:\nName: Rajesh Kumar\nAddress: No. 45, Anna Nagar, Chennai - 600040\n\
             Connection Date: 15-Mar-2023\nLast Activity: 14-Jan-2024 18:30 hrs\n\
             Tower Location: Anna Nagar East\nCall Records: Available for last 6 months\nStatus: Active",
        ),
        fixture(
            "CSR-002",
            STATIONS[1],
            "8765432109",
            ServiceProvider::Airtel,
            [at(2024, 1, 15, 11, 15), at(2024, 1, 15, 12, 0), at(2024, 1, 15, 16, 20)],
            "Subscriber Information:\nName: Priya Sharma\nAddress: Plot 23, RS Puram, Coimbatore - 641002\n\
             Activation: 28-Aug-2022\nLast Location: Race Course Road Tower\n\
             Data Usage: 2.5 GB (Last 24 hrs)\nCall Summary: 45 calls in last week\n\
             Account Status: Active - Postpaid",
        ),
        fixture(
            "CSR-003",
            STATIONS[2],
            "7654321098",
            ServiceProvider::Vi,
            [at(2024, 1, 14, 15, 30), at(2024, 1, 14, 16, 15), at(2024, 1, 15, 10, 45)],
            "Customer Data:\nName: Mohammed Ali\nAddress: 12/A, Meenakshi Nagar, Madurai - 625001\n\
             SIM Issue Date: 05-Dec-2023\nLast Known Location: Madurai Junction\n\
             Recent Activity: Voice calls - 12, SMS - 5 (Last 24 hrs)\nNetwork Type: 4G\n\
             Subscription: Prepaid Plan ₹199",
        ),
    ]
}
