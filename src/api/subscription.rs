use serde::Serialize;
use serde_json::Value;

use crate::client::AuthenticatedHttpClient;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
}

#[derive(Debug, Serialize)]
struct Checkout<'a> {
    plan_id: &'a str,
    billing_cycle: BillingCycle,
}

#[derive(Debug, Serialize)]
struct ActivationCode<'a> {
    code: &'a str,
}

#[derive(Debug, Clone)]
pub struct SubscriptionApi {
    client: AuthenticatedHttpClient,
}

impl SubscriptionApi {
    pub fn new(client: AuthenticatedHttpClient) -> Self {
        Self { client }
    }

    pub async fn plans(&self) -> Result<Value> {
        self.client.get("subscriptions/plans/").await
    }

    pub async fn current(&self) -> Result<Value> {
        self.client.get("subscriptions/current/").await
    }

    /// Start a checkout session. The response carries the payment page URL.
    pub async fn checkout(&self, plan_id: &str, billing_cycle: BillingCycle) -> Result<Value> {
        self.client.post("subscriptions/checkout/", &Checkout { plan_id, billing_cycle }).await
    }

    pub async fn activate_code(&self, code: &str) -> Result<Value> {
        self.client.post("subscriptions/activate-code/", &ActivationCode { code }).await
    }

    pub async fn cancel(&self) -> Result<Value> {
        self.client.post_empty("subscriptions/cancel/").await
    }

    pub async fn usage(&self) -> Result<Value> {
        self.client.get("subscriptions/usage/").await
    }
}
