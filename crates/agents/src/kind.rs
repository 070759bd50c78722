//! Closed list of built-in ERP domain agents.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use atlaserp_core::{AgentName, CoreError, CoreResult};

/// Built-in ERP domains, in routing priority order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Accounting,
    Crm,
    Inventory,
    Hr,
    Project,
    Sales,
    Purchase,
    Helpdesk,
    Marketing,
    Manufacturing,
}

impl AgentKind {
    /// Every kind, highest routing priority first.
    pub const ALL: [AgentKind; 10] = [
        AgentKind::Accounting,
        AgentKind::Crm,
        AgentKind::Inventory,
        AgentKind::Hr,
        AgentKind::Project,
        AgentKind::Sales,
        AgentKind::Purchase,
        AgentKind::Helpdesk,
        AgentKind::Marketing,
        AgentKind::Manufacturing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Accounting => "accounting",
            AgentKind::Crm => "crm",
            AgentKind::Inventory => "inventory",
            AgentKind::Hr => "hr",
            AgentKind::Project => "project",
            AgentKind::Sales => "sales",
            AgentKind::Purchase => "purchase",
            AgentKind::Helpdesk => "helpdesk",
            AgentKind::Marketing => "marketing",
            AgentKind::Manufacturing => "manufacturing",
        }
    }

    pub fn agent_name(&self) -> CoreResult<AgentName> {
        AgentName::new(self.as_str())
    }

    /// Lowercase routing keywords (substring matched against requests).
    pub fn default_keywords(&self) -> &'static [&'static str] {
        match self {
            AgentKind::Accounting => &[
                "invoice", "payment", "ledger", "journal", "account", "tax", "expense", "budget",
                "financial", "balance sheet", "profit", "reconcil",
            ],
            AgentKind::Crm => &[
                "customer", "lead", "contact", "opportunit", "client", "pipeline", "deal",
            ],
            AgentKind::Inventory => &[
                "inventory", "stock", "warehouse", "product", "sku", "reorder", "item",
            ],
            AgentKind::Hr => &[
                "employee", "payroll", "leave", "attendance", "recruit", "salary", "hiring",
                "onboarding",
            ],
            AgentKind::Project => &[
                "project", "task", "milestone", "timesheet", "deadline", "gantt",
            ],
            AgentKind::Sales => &[
                "sale", "quotation", "quote", "sales order", "revenue", "pricing", "discount",
            ],
            AgentKind::Purchase => &[
                "purchase", "vendor", "supplier", "procurement", "rfq",
            ],
            AgentKind::Helpdesk => &[
                "ticket", "support", "complaint", "helpdesk", "escalat",
            ],
            AgentKind::Marketing => &[
                "campaign", "marketing", "newsletter", "promotion", "audience",
            ],
            AgentKind::Manufacturing => &[
                "manufactur", "production", "bill of materials", "bom", "work order",
                "assembly",
            ],
        }
    }

    pub fn capabilities(&self) -> &'static [&'static str] {
        match self {
            AgentKind::Accounting => &[
                "invoice_lookup",
                "payment_status",
                "journal_entries",
                "financial_reports",
                "tax_summary",
            ],
            AgentKind::Crm => &[
                "customer_lookup",
                "lead_scoring",
                "pipeline_summary",
                "contact_history",
            ],
            AgentKind::Inventory => &[
                "stock_levels",
                "reorder_suggestions",
                "warehouse_transfers",
                "product_lookup",
            ],
            AgentKind::Hr => &[
                "employee_lookup",
                "leave_balance",
                "payroll_summary",
                "recruitment_status",
            ],
            AgentKind::Project => &[
                "project_status",
                "task_assignment",
                "timesheet_summary",
                "milestone_tracking",
            ],
            AgentKind::Sales => &[
                "quotation_drafting",
                "order_status",
                "revenue_forecast",
                "pricing_guidance",
            ],
            AgentKind::Purchase => &[
                "purchase_orders",
                "vendor_comparison",
                "rfq_drafting",
            ],
            AgentKind::Helpdesk => &[
                "ticket_triage",
                "ticket_status",
                "response_drafting",
                "sla_monitoring",
            ],
            AgentKind::Marketing => &[
                "campaign_planning",
                "audience_segmentation",
                "content_drafting",
            ],
            AgentKind::Manufacturing => &[
                "production_planning",
                "bom_lookup",
                "work_order_status",
                "capacity_planning",
            ],
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            AgentKind::Accounting => {
                "You are the accounting assistant of an ERP system. You answer questions about \
                 invoices, payments, journal entries, taxes and financial reports."
            }
            AgentKind::Crm => {
                "You are the CRM assistant of an ERP system. You help with customers, leads, \
                 contacts and the sales pipeline."
            }
            AgentKind::Inventory => {
                "You are the inventory assistant of an ERP system. You answer questions about \
                 stock levels, warehouses, products and reordering."
            }
            AgentKind::Hr => {
                "You are the HR assistant of an ERP system. You help with employees, leave, \
                 attendance, payroll and recruitment."
            }
            AgentKind::Project => {
                "You are the project management assistant of an ERP system. You help with \
                 projects, tasks, milestones and timesheets."
            }
            AgentKind::Sales => {
                "You are the sales assistant of an ERP system. You help with quotations, sales \
                 orders, pricing and revenue."
            }
            AgentKind::Purchase => {
                "You are the purchasing assistant of an ERP system. You help with purchase \
                 orders, vendors and requests for quotation."
            }
            AgentKind::Helpdesk => {
                "You are the helpdesk assistant of an ERP system. You triage support tickets \
                 and draft responses."
            }
            AgentKind::Marketing => {
                "You are the marketing assistant of an ERP system. You help plan campaigns, \
                 segment audiences and draft content."
            }
            AgentKind::Manufacturing => {
                "You are the manufacturing assistant of an ERP system. You help with production \
                 planning, bills of materials and work orders."
            }
        }
    }
}

impl core::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::validation(format!("unknown agent kind '{s}'")))
    }
}
