//! Built-in sample boards for demo mode.
//!
//! Formats are deliberately inconsistent (EU and US currency, ratio and
//! percent probabilities, mixed date styles) so a demo run exercises every
//! normalizer fallback.

use crate::domain::{BoardCategory, RawRecord, RawRecordSet};

struct DemoDeal {
    id: &'static str,
    name: &'static str,
    status: &'static str,
    amount: &'static str,
    stage: &'static str,
    probability: &'static str,
    owner: &'static str,
    close_date: &'static str,
    created_at: &'static str,
}

struct DemoWorkOrder {
    id: &'static str,
    name: &'static str,
    status: &'static str,
    priority: &'static str,
    start_date: &'static str,
    target_date: &'static str,
    completion_date: &'static str,
    owner: &'static str,
}

const DEALS: &[DemoDeal] = &[
    DemoDeal { id: "deal_001", name: "Acme Corp - Enterprise Contract", status: "Negotiation", amount: "$125,000", stage: "Proposal", probability: "75%", owner: "John Sales", close_date: "2024-03-15", created_at: "2024-01-10T09:00:00Z" },
    DemoDeal { id: "deal_002", name: "Global Industries - Initial Deal", status: "Proposal", amount: "€75.500,00", stage: "Discovery", probability: "0.3", owner: "Sarah Sales", close_date: "03/30/2024", created_at: "2024-02-01T10:15:00Z" },
    DemoDeal { id: "deal_003", name: "Tech Startup - Early Stage", status: "closed-won", amount: "50000", stage: "Closed", probability: "100", owner: "John Sales", close_date: "February 9, 2024", created_at: "2024-01-20T13:20:00Z" },
    DemoDeal { id: "deal_004", name: "Fortune 500 Company", status: "Stuck", amount: "$250,000", stage: "Legal Review", probability: "50%", owner: "Mike Sales", close_date: "15 Apr 24", created_at: "2024-02-03T08:45:00Z" },
    DemoDeal { id: "deal_005", name: "Mid-Market Growth Company", status: "Qualification", amount: "$95,000", stage: "Initial Call", probability: "15%", owner: "Sarah Sales", close_date: "", created_at: "2024-02-05T11:00:00Z" },
    DemoDeal { id: "deal_006", name: "Regional Retailer Renewal", status: "Closed Lost", amount: "£40,000", stage: "Closed", probability: "0%", owner: "Mike Sales", close_date: "2024-01-31", created_at: "2023-11-02T16:00:00Z" },
];

const WORK_ORDERS: &[DemoWorkOrder] = &[
    DemoWorkOrder { id: "wo_001", name: "Acme Corp - Onboarding", status: "In Progress", priority: "High", start_date: "2024-02-01", target_date: "2024-03-01", completion_date: "", owner: "Sarah Dev" },
    DemoWorkOrder { id: "wo_002", name: "API Integration Setup", status: "Done", priority: "Medium", start_date: "2024-02-01", target_date: "2024-02-15", completion_date: "2024-02-14", owner: "John Dev" },
    DemoWorkOrder { id: "wo_003", name: "Global Industries - Implementation", status: "in-progress", priority: "High", start_date: "02/05/2024", target_date: "March 15, 2024", completion_date: "", owner: "Sarah Dev" },
    DemoWorkOrder { id: "wo_004", name: "Data Migration Project", status: "Blocked", priority: "High", start_date: "2024-02-10", target_date: "2024-03-10", completion_date: "", owner: "Mike Dev" },
    DemoWorkOrder { id: "wo_005", name: "Documentation Update", status: "In Backlog", priority: "Low", start_date: "2024-03-01", target_date: "2024-03-30", completion_date: "", owner: "Alice Dev" },
    DemoWorkOrder { id: "wo_006", name: "Acme Corp - Training", status: "Completed", priority: "Medium", start_date: "2024-01-20", target_date: "2024-02-10", completion_date: "2024-02-20", owner: "" },
];

/// Raw records shaped like connector output: item `id`, `name` and
/// `created_at` plus board column titles.
pub fn demo_records() -> RawRecordSet {
    let deals = DEALS
        .iter()
        .map(|deal| {
            RawRecord::new(BoardCategory::Deal)
                .with("id", deal.id)
                .with("name", deal.name)
                .with("created_at", deal.created_at)
                .with("Status", deal.status)
                .with("Deal Amount", deal.amount)
                .with("Sales Stage", deal.stage)
                .with("Win Probability", deal.probability)
                .with("Owner", deal.owner)
                .with("Close Date", deal.close_date)
        })
        .collect();

    let work_orders = WORK_ORDERS
        .iter()
        .map(|order| {
            RawRecord::new(BoardCategory::WorkOrder)
                .with("id", order.id)
                .with("name", order.name)
                .with("Status", order.status)
                .with("Priority", order.priority)
                .with("Start Date", order.start_date)
                .with("Target Date", order.target_date)
                .with("Completion Date", order.completion_date)
                .with("Owner", order.owner)
        })
        .collect();

    let mut set = RawRecordSet::default();
    set.insert(BoardCategory::Deal, deals);
    set.insert(BoardCategory::WorkOrder, work_orders);
    set
}
