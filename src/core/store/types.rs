use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Client,
    Technician,
    Validator,
    Hitl,
    System,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Client => "client",
            AgentType::Technician => "technician",
            AgentType::Validator => "validator",
            AgentType::Hitl => "hitl",
            AgentType::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "client" => Some(AgentType::Client),
            "technician" => Some(AgentType::Technician),
            "validator" => Some(AgentType::Validator),
            "hitl" => Some(AgentType::Hitl),
            "system" => Some(AgentType::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
    Training,
    Maintenance,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Inactive => "inactive",
            AgentStatus::Training => "training",
            AgentStatus::Maintenance => "maintenance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AgentStatus::Active),
            "inactive" => Some(AgentStatus::Inactive),
            "training" => Some(AgentStatus::Training),
            "maintenance" => Some(AgentStatus::Maintenance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlRequestType {
    DecisionApproval,
    ManualUpdate,
    Escalation,
    ConfigurationChange,
}

impl HitlRequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitlRequestType::DecisionApproval => "decision_approval",
            HitlRequestType::ManualUpdate => "manual_update",
            HitlRequestType::Escalation => "escalation",
            HitlRequestType::ConfigurationChange => "configuration_change",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "decision_approval" => Some(HitlRequestType::DecisionApproval),
            "manual_update" => Some(HitlRequestType::ManualUpdate),
            "escalation" => Some(HitlRequestType::Escalation),
            "configuration_change" => Some(HitlRequestType::ConfigurationChange),
            _ => None,
        }
    }
}

/// Request lifecycle. `Approved`, `Rejected` and `Expired` are terminal;
/// nothing moves a request out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    Expired,
}

impl HitlStatus {
    pub const ALL: [HitlStatus; 5] = [
        HitlStatus::Pending,
        HitlStatus::InReview,
        HitlStatus::Approved,
        HitlStatus::Rejected,
        HitlStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HitlStatus::Pending => "pending",
            HitlStatus::InReview => "in_review",
            HitlStatus::Approved => "approved",
            HitlStatus::Rejected => "rejected",
            HitlStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(HitlStatus::Pending),
            "in_review" => Some(HitlStatus::InReview),
            "approved" => Some(HitlStatus::Approved),
            "rejected" => Some(HitlStatus::Rejected),
            "expired" => Some(HitlStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Created,
    InProgress,
    WaitingCustomer,
    WaitingTechnician,
    Resolved,
    Cancelled,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Created => "created",
            CaseStatus::InProgress => "in_progress",
            CaseStatus::WaitingCustomer => "waiting_customer",
            CaseStatus::WaitingTechnician => "waiting_technician",
            CaseStatus::Resolved => "resolved",
            CaseStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(CaseStatus::Created),
            "in_progress" => Some(CaseStatus::InProgress),
            "waiting_customer" => Some(CaseStatus::WaitingCustomer),
            "waiting_technician" => Some(CaseStatus::WaitingTechnician),
            "resolved" => Some(CaseStatus::Resolved),
            "cancelled" => Some(CaseStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl CasePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            CasePriority::Low => "low",
            CasePriority::Medium => "medium",
            CasePriority::High => "high",
            CasePriority::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(CasePriority::Low),
            "medium" => Some(CasePriority::Medium),
            "high" => Some(CasePriority::High),
            "critical" => Some(CasePriority::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    CameraOffline,
    AlarmIssue,
    AccessControl,
    Intercom,
    Network,
    Financial,
    Other,
}

impl CaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseType::CameraOffline => "camera_offline",
            CaseType::AlarmIssue => "alarm_issue",
            CaseType::AccessControl => "access_control",
            CaseType::Intercom => "intercom",
            CaseType::Network => "network",
            CaseType::Financial => "financial",
            CaseType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "camera_offline" => Some(CaseType::CameraOffline),
            "alarm_issue" => Some(CaseType::AlarmIssue),
            "access_control" => Some(CaseType::AccessControl),
            "intercom" => Some(CaseType::Intercom),
            "network" => Some(CaseType::Network),
            "financial" => Some(CaseType::Financial),
            "other" => Some(CaseType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Bar,
    Restaurant,
    Store,
    Condominium,
    Office,
    Other,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Bar => "bar",
            ClientType::Restaurant => "restaurant",
            ClientType::Store => "store",
            ClientType::Condominium => "condominium",
            ClientType::Office => "office",
            ClientType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bar" => Some(ClientType::Bar),
            "restaurant" => Some(ClientType::Restaurant),
            "store" => Some(ClientType::Store),
            "condominium" => Some(ClientType::Condominium),
            "office" => Some(ClientType::Office),
            "other" => Some(ClientType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Inactive,
    Suspended,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Active => "active",
            ClientStatus::Inactive => "inactive",
            ClientStatus::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ClientStatus::Active),
            "inactive" => Some(ClientStatus::Inactive),
            "suspended" => Some(ClientStatus::Suspended),
            _ => None,
        }
    }
}

/// The automation's suggested next step, pending human approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedAction {
    pub action: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanDecision {
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Value>,
    pub feedback: String,
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
}

/// One entry of an append-only audit log. Shared by the HITL request
/// conversation and the case history, which carry the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub message: String,
    pub from: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HitlRequestRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub request_type: HitlRequestType,
    pub status: HitlStatus,
    pub requesting_agent: AgentType,
    pub requesting_agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_case_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_client_id: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub proposed_action: ProposedAction,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_decision: Option<HumanDecision>,
    pub expires_at: DateTime<Utc>,
    pub conversation: Vec<ConversationEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    pub agent_id: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,
    pub last_active: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_agent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub case_type: CaseType,
    pub status: CaseStatus,
    pub priority: CasePriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to_type: Option<AgentType>,
    pub created_by: String,
    pub created_by_type: AgentType,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub history: Vec<ConversationEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_time: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalRecord {
    pub installation_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_visit: Option<DateTime<Utc>>,
    pub total_visits: i64,
    pub common_issues: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
    pub client_id: String,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub status: ClientStatus,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Value>,
    pub equipment: Vec<Value>,
    pub technical_record: TechnicalRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_info: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
