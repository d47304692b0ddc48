//! Action scorer: folds one business event into the current month's
//! aggregate of a single subject.
//!
//! Invoked synchronously by whatever records the event. It never fails
//! the caller on bad input: unknown actions, missing amounts and
//! out-of-range ratings are logged and dropped.

use crate::{
    aggregate::{Aggregate, Counter},
    error::LedgerResult,
    store::LedgerStore,
    types::{Money, Period, SubjectKind},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    PropertyAssigned,
    AppointmentAssigned,
    AppointmentCompleted,
    ContractSigned,
    /// Amount is the star rating, 1..=5.
    Rated,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CustomerAction {
    ViewingRequested,
    ViewingAttended,
    PurchaseMade,
    RentalMade,
    ContractSigned,
    SpendingMade,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OwnerAction {
    PropertyForSaleListed,
    PropertyForRentListed,
    PropertySold,
    PropertyRented,
    MoneyReceived,
}

/// An action tagged with the kind of subject it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Agent(AgentAction),
    Customer(CustomerAction),
    Owner(OwnerAction),
}

impl From<AgentAction> for Action {
    fn from(a: AgentAction) -> Self { Action::Agent(a) }
}

impl From<CustomerAction> for Action {
    fn from(a: CustomerAction) -> Self { Action::Customer(a) }
}

impl From<OwnerAction> for Action {
    fn from(a: OwnerAction) -> Self { Action::Owner(a) }
}

/// What an action does to an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    Counters(&'static [Counter]),
    Monetary,
    Rating,
}

impl Action {
    pub fn subject_kind(&self) -> SubjectKind {
        match self {
            Action::Agent(_)    => SubjectKind::Agent,
            Action::Customer(_) => SubjectKind::Customer,
            Action::Owner(_)    => SubjectKind::Owner,
        }
    }

    /// Resolve a snake_case action name for `kind`. Names belonging to
    /// another kind do not resolve.
    pub fn from_name(kind: SubjectKind, name: &str) -> Option<Self> {
        let value = serde_json::Value::String(name.to_string());
        match kind {
            SubjectKind::Agent => serde_json::from_value::<AgentAction>(value).ok().map(Action::Agent),
            SubjectKind::Customer => {
                serde_json::from_value::<CustomerAction>(value).ok().map(Action::Customer)
            }
            SubjectKind::Owner => serde_json::from_value::<OwnerAction>(value).ok().map(Action::Owner),
        }
    }

    fn delta(&self) -> Delta {
        use Counter::*;
        match self {
            Action::Agent(a) => match a {
                AgentAction::PropertyAssigned     => Delta::Counters(&[PropertiesAssigned, HandlingProperties]),
                AgentAction::AppointmentAssigned  => Delta::Counters(&[AppointmentsAssigned, HandlingProperties]),
                AgentAction::AppointmentCompleted => Delta::Counters(&[AppointmentsCompleted]),
                AgentAction::ContractSigned       => Delta::Counters(&[ContractsSigned]),
                AgentAction::Rated                => Delta::Rating,
            },
            Action::Customer(a) => match a {
                CustomerAction::ViewingRequested => Delta::Counters(&[ViewingsRequested]),
                CustomerAction::ViewingAttended  => Delta::Counters(&[ViewingsAttended]),
                CustomerAction::PurchaseMade     => Delta::Counters(&[Purchases]),
                CustomerAction::RentalMade       => Delta::Counters(&[Rentals]),
                CustomerAction::ContractSigned   => Delta::Counters(&[ContractsSigned]),
                CustomerAction::SpendingMade     => Delta::Monetary,
            },
            Action::Owner(a) => match a {
                OwnerAction::PropertyForSaleListed => Delta::Counters(&[PropertiesListed, ListedForSale]),
                OwnerAction::PropertyForRentListed => Delta::Counters(&[PropertiesListed, ListedForRent]),
                OwnerAction::PropertySold          => Delta::Counters(&[PropertiesSold]),
                OwnerAction::PropertyRented        => Delta::Counters(&[PropertiesRented]),
                OwnerAction::MoneyReceived         => Delta::Monetary,
            },
        }
    }
}

/// Apply `action` to `agg` in place. Returns false, leaving `agg`
/// untouched, when the action needs an amount it did not get or the
/// rating is out of range.
pub fn apply_delta(agg: &mut Aggregate, action: Action, amount: Option<Money>) -> bool {
    match action.delta() {
        Delta::Counters(counters) => {
            for c in counters {
                agg.increment(*c);
            }
            true
        }
        Delta::Monetary => match amount {
            Some(value) => {
                agg.monetary += value;
                true
            }
            None => false,
        },
        Delta::Rating => match amount {
            Some(stars) if (1..=5).contains(&stars) => {
                agg.record_rating(stars);
                true
            }
            _ => false,
        },
    }
}

pub struct ActionScorer {
    store: LedgerStore,
}

impl ActionScorer {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Fold `action` into the subject's aggregate for the month of
    /// `date`, creating the record on first use. Returns whether the
    /// action changed anything.
    pub fn apply_action(
        &self,
        date: NaiveDate,
        subject_id: &str,
        action: impl Into<Action>,
        amount: Option<Money>,
    ) -> LedgerResult<bool> {
        let action = action.into();
        let kind = action.subject_kind();
        let period = Period::of(date);

        let mut agg = self
            .store
            .monthly_aggregate(kind, subject_id, period)?
            .unwrap_or_else(|| Aggregate::new_monthly(kind, subject_id, period));

        if !apply_delta(&mut agg, action, amount) {
            log::warn!(
                "Ignoring {action:?} for {kind} {subject_id}: amount {amount:?} is missing or out of range"
            );
            return Ok(false);
        }

        self.store.save_aggregate(&agg)?;
        log::debug!("{kind} {subject_id} {period}: applied {action:?}");
        Ok(true)
    }

    /// Same as `apply_action`, with the action given by name.
    /// Unknown names are logged and ignored; no record is created.
    pub fn apply_named_action(
        &self,
        date: NaiveDate,
        kind: SubjectKind,
        subject_id: &str,
        name: &str,
        amount: Option<Money>,
    ) -> LedgerResult<bool> {
        match Action::from_name(kind, name) {
            Some(action) => self.apply_action(date, subject_id, action, amount),
            None => {
                log::warn!("Unknown {kind} action '{name}' for {subject_id}; ignored");
                Ok(false)
            }
        }
    }
}
