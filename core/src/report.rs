//! Financial report document and its list reconciliation.

use crate::{
    directory::Dimension,
    types::{EntityId, Money, Period},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevenueBucket {
    pub dimension_id: EntityId,
    pub revenue:      Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSalaryItem {
    pub agent_id: EntityId,
    pub salary:   Money,
    pub paid:     Money,
    pub unpaid:   Money,
    pub bonus:    Money,
}

impl AgentSalaryItem {
    pub fn zero(agent_id: &str) -> Self {
        Self { agent_id: agent_id.to_string(), salary: 0, paid: 0, unpaid: 0, bonus: 0 }
    }
}

/// One per (month, year).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialReport {
    /// Identity of the persisted document. `None` until first saved,
    /// and cleared when a new month is seeded from this one.
    pub report_id:      Option<String>,
    pub period:         Period,
    pub title:          String,
    pub description:    String,
    pub total_revenue:  Money,
    pub contract_count: i64,
    pub tax:            Money,
    /// Running figure: the predecessor's net profit plus this month's.
    pub net_profit:     Money,
    pub total_rates:    i64,
    pub avg_rating:     f64,
    /// Running total of all salary entitlements computed so far.
    pub total_salary:   Money,
    pub revenue_cities:         Vec<RevenueBucket>,
    pub revenue_districts:      Vec<RevenueBucket>,
    pub revenue_wards:          Vec<RevenueBucket>,
    pub revenue_property_types: Vec<RevenueBucket>,
    pub salary_month:  Vec<AgentSalaryItem>,
    pub salary_career: Vec<AgentSalaryItem>,
    /// Set once the end-of-month salary pass has run for this period.
    pub salary_finalized: bool,
}

impl FinancialReport {
    pub fn empty(period: Period) -> Self {
        Self {
            report_id: None,
            period,
            title: "Financial Report".into(),
            description: String::new(),
            total_revenue: 0,
            contract_count: 0,
            tax: 0,
            net_profit: 0,
            total_rates: 0,
            avg_rating: 0.0,
            total_salary: 0,
            revenue_cities: Vec::new(),
            revenue_districts: Vec::new(),
            revenue_wards: Vec::new(),
            revenue_property_types: Vec::new(),
            salary_month: Vec::new(),
            salary_career: Vec::new(),
            salary_finalized: false,
        }
    }

    /// Deep copy of `previous` re-targeted at `period`, with its identity
    /// cleared. Running totals and career salaries carry forward; the
    /// monthly salary entitlements start over.
    pub fn seeded_from(previous: &FinancialReport, period: Period) -> Self {
        let mut report = previous.clone();
        report.report_id = None;
        report.period = period;
        report.salary_finalized = false;
        for item in &mut report.salary_month {
            *item = AgentSalaryItem::zero(&item.agent_id);
        }
        report
    }

    pub fn buckets(&self, dimension: Dimension) -> &[RevenueBucket] {
        match dimension {
            Dimension::City         => &self.revenue_cities,
            Dimension::District     => &self.revenue_districts,
            Dimension::Ward         => &self.revenue_wards,
            Dimension::PropertyType => &self.revenue_property_types,
        }
    }

    pub fn buckets_mut(&mut self, dimension: Dimension) -> &mut Vec<RevenueBucket> {
        match dimension {
            Dimension::City         => &mut self.revenue_cities,
            Dimension::District     => &mut self.revenue_districts,
            Dimension::Ward         => &mut self.revenue_wards,
            Dimension::PropertyType => &mut self.revenue_property_types,
        }
    }

    pub fn bucket_revenue(&self, dimension: Dimension, id: &str) -> Option<Money> {
        self.buckets(dimension)
            .iter()
            .find(|b| b.dimension_id == id)
            .map(|b| b.revenue)
    }
}

/// Prune buckets whose id is no longer valid and append the missing
/// ones at zero. Existing buckets keep their position and value.
pub fn reconcile_buckets(buckets: &mut Vec<RevenueBucket>, valid_ids: &[EntityId]) {
    let valid: HashSet<&str> = valid_ids.iter().map(String::as_str).collect();
    buckets.retain(|b| valid.contains(b.dimension_id.as_str()));
    // Duplicates can only come from a hand-edited document; keep the first.
    let mut seen: HashSet<String> = HashSet::new();
    buckets.retain(|b| seen.insert(b.dimension_id.clone()));

    for id in valid_ids {
        if !seen.contains(id) {
            seen.insert(id.clone());
            buckets.push(RevenueBucket { dimension_id: id.clone(), revenue: 0 });
        }
    }
}

/// Same contract as `reconcile_buckets`, for salary items.
pub fn reconcile_salary_items(items: &mut Vec<AgentSalaryItem>, agent_ids: &[EntityId]) {
    let valid: HashSet<&str> = agent_ids.iter().map(String::as_str).collect();
    items.retain(|i| valid.contains(i.agent_id.as_str()));
    let mut seen: HashSet<String> = HashSet::new();
    items.retain(|i| seen.insert(i.agent_id.clone()));

    for id in agent_ids {
        if !seen.contains(id) {
            seen.insert(id.clone());
            items.push(AgentSalaryItem::zero(id));
        }
    }
}
