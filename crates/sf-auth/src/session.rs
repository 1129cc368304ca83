//! Owned sign-in state
//!
//! All flow secrets and credentials live in one explicitly owned session
//! object that is passed by reference into the flow controller; nothing
//! auth-related hides in globals. `reset()` is the single way to wipe it.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secrets backing one sign-in attempt
///
/// Three independent random values, generated together when the attempt
/// starts and never persisted to durable storage.
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct FlowContext {
    /// Anti-CSRF value echoed back by the provider
    pub state: String,

    /// PKCE verifier revealed only at token exchange
    pub code_verifier: String,

    /// Anti-replay value bound into the identity token
    pub nonce: String,
}

/// The volatile credential pair
///
/// Replaced wholesale on every successful exchange or refresh; the refresh
/// token is persisted separately in the keystore.
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct CredentialPair {
    pub access_token: String,
    pub id_token: String,
}

/// Outcome of presenting an authorization result to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
    /// First matching delivery: the code may be exchanged exactly once
    Granted { code_verifier: String },

    /// A matching result was already redeemed; ignore this delivery
    AlreadyRedeemed,

    /// No active flow, or the state does not match it
    Mismatch,
}

/// Session state for the signed-in (or signing-in) user
#[derive(Debug, Default)]
pub struct AuthSession {
    flow: Option<FlowContext>,
    /// One-shot flag: the authorization code is single-use by protocol
    /// contract, so at most one redemption per flow context
    redeemed: bool,
    credentials: Option<CredentialPair>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh flow context, replacing any previous attempt
    ///
    /// Replacing the context invalidates in-flight redemption for the old
    /// state: a later delivery carrying it no longer matches.
    pub fn begin_flow(&mut self, context: FlowContext) {
        self.flow = Some(context);
        self.redeemed = false;
    }

    /// Drop the flow context without touching credentials
    pub fn abandon_flow(&mut self) {
        self.flow = None;
        self.redeemed = false;
    }

    pub fn has_active_flow(&self) -> bool {
        self.flow.is_some()
    }

    /// Nonce on record for the active attempt, if any
    pub fn nonce(&self) -> Option<&str> {
        self.flow.as_ref().map(|ctx| ctx.nonce.as_str())
    }

    /// Present a delivered `state` for redemption
    ///
    /// The context is kept (with the flag set) after a grant so that the
    /// same result arriving over the second transport is recognized and
    /// ignored rather than mistaken for a forged redirect.
    pub fn redeem(&mut self, state: &str) -> Redemption {
        match &self.flow {
            None => Redemption::Mismatch,
            Some(ctx) if ctx.state != state => Redemption::Mismatch,
            Some(_) if self.redeemed => Redemption::AlreadyRedeemed,
            Some(ctx) => {
                let code_verifier = ctx.code_verifier.clone();
                self.redeemed = true;
                Redemption::Granted { code_verifier }
            }
        }
    }

    /// Replace the credential pair wholesale
    pub fn store_credentials(&mut self, credentials: CredentialPair) {
        self.credentials = Some(credentials);
    }

    pub fn credentials(&self) -> Option<&CredentialPair> {
        self.credentials.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// Wipe everything: flow secrets, flag, credentials
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(state: &str) -> FlowContext {
        FlowContext {
            state: state.to_string(),
            code_verifier: format!("verifier-for-{}", state),
            nonce: format!("nonce-for-{}", state),
        }
    }

    #[test]
    fn test_redeem_matching_state_once() {
        let mut session = AuthSession::new();
        session.begin_flow(context("s1"));

        assert_eq!(
            session.redeem("s1"),
            Redemption::Granted {
                code_verifier: "verifier-for-s1".to_string()
            }
        );
        // The same result delivered again is ignored, not rejected
        assert_eq!(session.redeem("s1"), Redemption::AlreadyRedeemed);
    }

    #[test]
    fn test_redeem_wrong_state() {
        let mut session = AuthSession::new();
        session.begin_flow(context("s1"));

        assert_eq!(session.redeem("s2"), Redemption::Mismatch);
    }

    #[test]
    fn test_redeem_without_flow() {
        let mut session = AuthSession::new();
        assert_eq!(session.redeem("s1"), Redemption::Mismatch);
    }

    #[test]
    fn test_new_flow_invalidates_old_state() {
        let mut session = AuthSession::new();
        session.begin_flow(context("s1"));
        session.begin_flow(context("s2"));

        // The old state no longer redeems, the new one does
        assert_eq!(session.redeem("s1"), Redemption::Mismatch);
        assert!(matches!(session.redeem("s2"), Redemption::Granted { .. }));
    }

    #[test]
    fn test_new_flow_clears_redeemed_flag() {
        let mut session = AuthSession::new();
        session.begin_flow(context("s1"));
        let _ = session.redeem("s1");

        session.begin_flow(context("s2"));
        assert!(matches!(session.redeem("s2"), Redemption::Granted { .. }));
    }

    #[test]
    fn test_credentials_replaced_wholesale() {
        let mut session = AuthSession::new();
        session.store_credentials(CredentialPair {
            access_token: "at-1".to_string(),
            id_token: "it-1".to_string(),
        });
        session.store_credentials(CredentialPair {
            access_token: "at-2".to_string(),
            id_token: "it-2".to_string(),
        });

        assert_eq!(session.credentials().unwrap().access_token, "at-2");
    }

    #[test]
    fn test_reset_wipes_everything() {
        let mut session = AuthSession::new();
        session.begin_flow(context("s1"));
        session.store_credentials(CredentialPair {
            access_token: "at".to_string(),
            id_token: "it".to_string(),
        });

        session.reset();

        assert!(!session.has_active_flow());
        assert!(!session.is_authenticated());
        assert_eq!(session.redeem("s1"), Redemption::Mismatch);
    }
}
