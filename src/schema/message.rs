use serde::{Deserialize, Serialize};

use super::flow::FlowId;

/// Newtype wrapper for message IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of the conversation a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    Customer,
    Bot,
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Bot => "bot",
        }
    }
}

/// Delivery tick shown next to a bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    #[default]
    Read,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub sku: String,
    pub name: String,
    pub price_cents: u64,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
}

/// The body of a chat bubble. Each variant maps to one WhatsApp message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Content {
    Text(String),
    Template {
        #[serde(default)]
        header: Option<String>,
        body: String,
        #[serde(default)]
        footer: Option<String>,
        #[serde(default)]
        buttons: Vec<String>,
    },
    Catalog {
        title: String,
        items: Vec<CatalogItem>,
    },
    List {
        title: String,
        button: String,
        sections: Vec<ListSection>,
    },
    QuickReply {
        body: String,
        replies: Vec<String>,
    },
    Cart {
        items: Vec<CartLine>,
        currency: String,
    },
    PointsUpdate {
        earned: u64,
        balance: u64,
        #[serde(default)]
        tier: Option<String>,
    },
}

impl Content {
    /// Short machine-friendly name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Template { .. } => "template",
            Self::Catalog { .. } => "catalog",
            Self::List { .. } => "list",
            Self::QuickReply { .. } => "quick-reply",
            Self::Cart { .. } => "cart",
            Self::PointsUpdate { .. } => "points-update",
        }
    }

    /// One-line plain text rendering of the bubble.
    pub fn preview(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Template { header, body, .. } => match header {
                Some(h) => format!("{h}: {body}"),
                None => body.clone(),
            },
            Self::Catalog { title, items } => format!("{title} ({} items)", items.len()),
            Self::List { title, button, .. } => format!("{title} [{button}]"),
            Self::QuickReply { body, replies } => format!("{body} [{}]", replies.join(" | ")),
            Self::Cart { items, currency } => {
                let count = items
                    .iter()
                    .fold(0u32, |n, l| n.saturating_add(l.quantity));
                format!("Cart: {count} items, {}", format_money(self.cart_total(), currency))
            }
            Self::PointsUpdate {
                earned,
                balance,
                tier,
            } => match tier {
                Some(t) => format!("+{earned} points, balance {balance} ({t})"),
                None => format!("+{earned} points, balance {balance}"),
            },
        }
    }

    /// Sum of a cart's lines in cents. Zero for every other variant.
    pub fn cart_total(&self) -> u64 {
        match self {
            Self::Cart { items, .. } => items.iter().fold(0u64, |total, l| {
                total.saturating_add(l.unit_price_cents.saturating_mul(u64::from(l.quantity)))
            }),
            _ => 0,
        }
    }
}

fn format_money(cents: u64, currency: &str) -> String {
    format!("{currency} {}.{:02}", cents / 100, cents % 100)
}

/// Opens an inline flow some time after its message appears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowLaunch {
    pub flow: FlowId,
    #[serde(default)]
    pub after_ms: u64,
    /// When set, the demo walks the flow itself using each step's mock value.
    #[serde(default)]
    pub auto_advance: Option<AutoAdvance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoAdvance {
    pub step_ms: u64,
}

/// A single bubble in the scripted conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub content: Content,
    /// When the bubble appears, in ms from playback start.
    pub at_ms: u64,
    /// How long the typing indicator runs before the bubble appears.
    #[serde(default)]
    pub typing_ms: u64,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub status: DeliveryStatus,
    #[serde(default)]
    pub launches: Option<FlowLaunch>,
}
