//! Seeded synthetic workload: fills the directory tables and generates a
//! day of business activity, so the engine can run end to end.
//!
//! Same seed and same sequence of days give the same database.

use crate::{
    action::{ActionScorer, AgentAction, CustomerAction, OwnerAction},
    directory::{PaymentStatus, PaymentType},
    error::LedgerResult,
    rng::{StreamRng, StreamSlot},
    store::{LedgerStore, NewPayment},
    types::{EntityId, Money, SubjectKind},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkloadSize {
    pub agents:             usize,
    pub customers:          usize,
    pub owners:             usize,
    pub cities:             usize,
    pub districts_per_city: usize,
    pub wards_per_district: usize,
    pub properties:         usize,
}

impl Default for WorkloadSize {
    fn default() -> Self {
        Self {
            agents: 12,
            customers: 60,
            owners: 20,
            cities: 3,
            districts_per_city: 3,
            wards_per_district: 2,
            properties: 80,
        }
    }
}

/// What one simulated day produced.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayActivity {
    pub actions:   usize,
    pub payments:  usize,
    pub contracts: usize,
}

const CITY_NAMES: &[&str] = &[
    "Riverside", "Harbor City", "Northgate", "Lakeview", "Eastbrook", "Stonefield",
];
const PROPERTY_TYPES: &[(&str, &str)] = &[
    ("apartment", "Apartment"),
    ("house", "House"),
    ("villa", "Villa"),
    ("office", "Office"),
    ("land", "Land"),
];
/// Revenue types appear most often; the rest are internal transfers.
const PAYMENT_TYPES: &[PaymentType] = &[
    PaymentType::ServiceFee,
    PaymentType::ServiceFee,
    PaymentType::Deposit,
    PaymentType::Commission,
    PaymentType::Commission,
    PaymentType::Salary,
    PaymentType::MoneySale,
    PaymentType::MoneyRental,
    PaymentType::Penalty,
];

pub struct Workload {
    size:       WorkloadSize,
    directory:  StreamRng,
    agent:      StreamRng,
    customer:   StreamRng,
    owner:      StreamRng,
    payment:    StreamRng,
    contract:   StreamRng,
    agents:     Vec<EntityId>,
    customers:  Vec<EntityId>,
    owners:     Vec<EntityId>,
    properties: Vec<EntityId>,
    next_payment:  u64,
    next_contract: u64,
}

impl Workload {
    pub fn new(seed: u64, size: WorkloadSize) -> Self {
        Self {
            size,
            directory: StreamRng::new(seed, StreamSlot::Directory),
            agent: StreamRng::new(seed, StreamSlot::Agent),
            customer: StreamRng::new(seed, StreamSlot::Customer),
            owner: StreamRng::new(seed, StreamSlot::Owner),
            payment: StreamRng::new(seed, StreamSlot::Payment),
            contract: StreamRng::new(seed, StreamSlot::Contract),
            agents: Vec::new(),
            customers: Vec::new(),
            owners: Vec::new(),
            properties: Vec::new(),
            next_payment: 0,
            next_contract: 0,
        }
    }

    /// Insert subjects, locations, property types and properties.
    pub fn populate(&mut self, store: &LedgerStore) -> LedgerResult<()> {
        for (kind, count, ids) in [
            (SubjectKind::Agent, self.size.agents, &mut self.agents),
            (SubjectKind::Customer, self.size.customers, &mut self.customers),
            (SubjectKind::Owner, self.size.owners, &mut self.owners),
        ] {
            for i in 1..=count {
                let id = format!("{kind}-{i:03}");
                store.insert_subject(&id, kind, &format!("{kind} {i}"))?;
                ids.push(id);
            }
        }

        let mut wards = Vec::new();
        for c in 0..self.size.cities {
            let city_id = format!("city-{:02}", c + 1);
            let city_name = CITY_NAMES.get(c).copied().unwrap_or("Outskirts");
            store.insert_city(&city_id, city_name)?;
            for d in 1..=self.size.districts_per_city {
                let district_id = format!("{city_id}-d{d}");
                store.insert_district(&district_id, &city_id, &format!("{city_name} District {d}"))?;
                for w in 1..=self.size.wards_per_district {
                    let ward_id = format!("{district_id}-w{w}");
                    store.insert_ward(&ward_id, &district_id, &format!("Ward {w}"))?;
                    wards.push(ward_id);
                }
            }
        }
        for (id, name) in PROPERTY_TYPES {
            store.insert_property_type(id, name)?;
        }
        let type_ids: Vec<&str> = PROPERTY_TYPES.iter().map(|(id, _)| *id).collect();

        for i in 1..=self.size.properties {
            let id = format!("prop-{i:04}");
            // A few properties are never placed, so their payments have
            // no location.
            let ward = if self.directory.chance(0.05) {
                None
            } else {
                self.directory.pick(&wards).map(String::as_str)
            };
            store.insert_property(
                &id,
                ward,
                self.directory.pick(&type_ids).copied(),
                self.directory.pick(&self.owners).map(String::as_str),
                self.directory.pick(&self.agents).map(String::as_str),
            )?;
            self.properties.push(id);
        }
        log::info!(
            "Workload populated: {} agents, {} customers, {} owners, {} properties",
            self.agents.len(),
            self.customers.len(),
            self.owners.len(),
            self.properties.len()
        );
        Ok(())
    }

    /// Generate one day of activity dated `date`.
    pub fn simulate_day(
        &mut self,
        date: NaiveDate,
        store: &LedgerStore,
        scorer: &ActionScorer,
    ) -> LedgerResult<DayActivity> {
        let mut day = DayActivity::default();

        for id in &self.agents {
            let rng = &mut self.agent;
            let mut act = |action: AgentAction, amount: Option<Money>| -> LedgerResult<()> {
                if scorer.apply_action(date, id, action, amount)? {
                    day.actions += 1;
                }
                Ok(())
            };
            if rng.chance(0.04) { act(AgentAction::PropertyAssigned, None)?; }
            if rng.chance(0.25) { act(AgentAction::AppointmentAssigned, None)?; }
            if rng.chance(0.18) { act(AgentAction::AppointmentCompleted, None)?; }
            if rng.chance(0.03) { act(AgentAction::ContractSigned, None)?; }
            if rng.chance(0.12) {
                let stars = rng.between(1, 5);
                act(AgentAction::Rated, Some(stars))?;
            }
        }

        for id in &self.customers {
            let rng = &mut self.customer;
            let mut act = |action: CustomerAction, amount: Option<Money>| -> LedgerResult<()> {
                if scorer.apply_action(date, id, action, amount)? {
                    day.actions += 1;
                }
                Ok(())
            };
            if rng.chance(0.10) { act(CustomerAction::ViewingRequested, None)?; }
            if rng.chance(0.06) { act(CustomerAction::ViewingAttended, None)?; }
            if rng.chance(0.005) { act(CustomerAction::PurchaseMade, None)?; }
            if rng.chance(0.01) { act(CustomerAction::RentalMade, None)?; }
            if rng.chance(0.01) { act(CustomerAction::ContractSigned, None)?; }
            if rng.chance(0.03) {
                let amount = rng.between(1_000_000, 80_000_000);
                act(CustomerAction::SpendingMade, Some(amount))?;
            }
        }

        for id in &self.owners {
            let rng = &mut self.owner;
            let mut act = |action: OwnerAction, amount: Option<Money>| -> LedgerResult<()> {
                if scorer.apply_action(date, id, action, amount)? {
                    day.actions += 1;
                }
                Ok(())
            };
            if rng.chance(0.03) { act(OwnerAction::PropertyForSaleListed, None)?; }
            if rng.chance(0.04) { act(OwnerAction::PropertyForRentListed, None)?; }
            if rng.chance(0.01) { act(OwnerAction::PropertySold, None)?; }
            if rng.chance(0.02) { act(OwnerAction::PropertyRented, None)?; }
            if rng.chance(0.03) {
                let amount = rng.between(5_000_000, 200_000_000);
                act(OwnerAction::MoneyReceived, Some(amount))?;
            }
        }

        for _ in 0..self.payment.between(0, 5) {
            self.next_payment += 1;
            let payment_id = format!("pay-{:06}", self.next_payment);
            let status = if self.payment.chance(0.9) {
                PaymentStatus::Success
            } else if self.payment.chance(0.5) {
                PaymentStatus::Pending
            } else {
                PaymentStatus::Failed
            };
            let payment_type = self
                .payment
                .pick(PAYMENT_TYPES)
                .copied()
                .unwrap_or(PaymentType::ServiceFee);
            let amount = self.payment.between(500_000, 30_000_000);
            store.insert_payment(&NewPayment {
                payment_id: &payment_id,
                property_id: self.payment.pick(&self.properties).map(String::as_str),
                amount,
                payment_type,
                status,
                paid_on: date,
            })?;
            day.payments += 1;
        }

        if self.contract.chance(0.3) {
            self.next_contract += 1;
            let contract_id = format!("contract-{:05}", self.next_contract);
            let property = self.contract.pick(&self.properties).map(String::as_str);
            store.insert_contract(&contract_id, property, date)?;
            day.contracts += 1;
        }

        log::debug!(
            "{date}: {} actions, {} payments, {} contracts",
            day.actions,
            day.payments,
            day.contracts
        );
        Ok(day)
    }
}
