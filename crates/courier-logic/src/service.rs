//! Routing and delivery: the logic tier's request handlers.
//!
//! Every send is made durable before it is acknowledged. Live delivery to
//! online recipients happens afterwards on spawned tasks, gated by a
//! semaphore, and its failures are only logged: an undelivered message
//! stays unread in the store until the recipient pulls it.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use courier_shared::messages::*;
use courier_shared::status::{
    describe, STATUS_GROUP_NOT_FOUND, STATUS_INVALID_REQUEST, STATUS_INVALID_USER, STATUS_OK,
};
use courier_shared::types::MessageKind;
use courier_store::{MessageStore, NewMessage, PresenceDirectory};

use crate::error::ServerError;
use crate::policy::IdentityPolicy;
use crate::push_client::PushClient;

/// Reason code carried by kick-outs triggered by an explicit logout.
pub const KICK_REASON_LOGOUT: i32 = 0;

#[derive(Clone)]
pub struct RoutingService {
    store: Arc<dyn MessageStore>,
    presence: Arc<dyn PresenceDirectory>,
    push: Arc<dyn PushClient>,
    policy: Arc<dyn IdentityPolicy>,
    deliveries: Arc<Semaphore>,
}

impl RoutingService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        presence: Arc<dyn PresenceDirectory>,
        push: Arc<dyn PushClient>,
        policy: Arc<dyn IdentityPolicy>,
        max_inflight: usize,
    ) -> Self {
        Self {
            store,
            presence,
            push,
            policy,
            deliveries: Arc::new(Semaphore::new(max_inflight.max(1))),
        }
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Validate `req.uid` and record `caller_addr` as its gate on success.
    pub fn authenticate(
        &self,
        req: &AuthRequest,
        caller_addr: &str,
    ) -> Result<AuthResponse, ServerError> {
        let status = if self.policy.accepts(&req.uid) {
            self.presence.set(&req.uid, caller_addr)?;
            info!(uid = %req.uid, gate = %caller_addr, "User online");
            STATUS_OK
        } else {
            debug!(uid = %req.uid, "Identity rejected");
            STATUS_INVALID_USER
        };

        Ok(AuthResponse {
            status,
            msg: describe(status).to_string(),
            ts: now_millis(),
            seq: req.seq,
        })
    }

    /// Answer at once; the kick-out runs in the background.
    pub fn logout(&self, req: &LogoutRequest) -> LogoutResponse {
        let this = self.clone();
        let uid = req.uid.clone();
        self.spawn_delivery(async move {
            if let Err(e) = this.kick_out(&uid, KICK_REASON_LOGOUT).await {
                warn!(uid = %uid, error = %e, "Kick-out failed");
            }
        });

        LogoutResponse {
            ts: now_millis(),
            seq: req.seq,
        }
    }

    /// Disconnect `uid` from its gate and drop its presence entry.
    ///
    /// Returns whether the user was online. Safe to repeat.
    pub async fn kick_out(&self, uid: &str, reason: i32) -> Result<bool, ServerError> {
        let Some(addr) = self.presence.get(uid)? else {
            debug!(uid = %uid, "Kick-out for offline user, nothing to do");
            return Ok(false);
        };

        let req = KickOutRequest {
            uid: uid.to_string(),
            reason,
            ts: now_millis(),
        };
        if let Err(e) = self.push.kick_out(&addr, &req).await {
            warn!(uid = %uid, gate = %addr, error = %e, "Kick-out push failed");
        }

        if self.presence.delete(uid, &addr)? {
            info!(uid = %uid, gate = %addr, "User offline");
        } else {
            debug!(uid = %uid, gate = %addr, "User re-registered elsewhere, keeping new entry");
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    pub fn send_c2c(&self, req: &C2CSendRequest) -> Result<C2CSendResponse, ServerError> {
        if req.to.is_empty() || req.content.is_empty() {
            return Ok(C2CSendResponse {
                status: STATUS_INVALID_REQUEST,
                msg_id: 0,
                ts: now_millis(),
                seq: req.seq,
            });
        }

        let msg_id = self.store.save_message(
            &NewMessage {
                from: &req.from,
                to: &req.to,
                content: &req.content,
                seq: req.seq,
                send_time: send_time(req.ts),
                kind: MessageKind::C2C,
            },
            std::slice::from_ref(&req.to),
        )?;

        debug!(from = %req.from, to = %req.to, msg_id, "One-to-one message stored");

        let this = self.clone();
        let push = C2CPushRequest {
            from: req.from.clone(),
            to: req.to.clone(),
            seq: req.seq.wrapping_add(1),
            content: req.content.clone(),
            msg_id,
            ts: now_millis(),
        };
        self.spawn_delivery(async move { this.deliver_c2c(push).await });

        Ok(C2CSendResponse {
            status: STATUS_OK,
            msg_id,
            ts: now_millis(),
            seq: req.seq,
        })
    }

    async fn deliver_c2c(&self, push: C2CPushRequest) {
        let addr = match self.presence.get(&push.to) {
            Ok(Some(addr)) => addr,
            Ok(None) => {
                debug!(to = %push.to, msg_id = push.msg_id, "Recipient offline, left for pull");
                return;
            }
            Err(e) => {
                warn!(to = %push.to, error = %e, "Presence lookup failed");
                return;
            }
        };

        match self.push.c2c_push(&addr, &push).await {
            Ok(_) => debug!(to = %push.to, gate = %addr, msg_id = push.msg_id, "Pushed"),
            Err(e) => warn!(
                to = %push.to,
                gate = %addr,
                msg_id = push.msg_id,
                error = %e,
                "One-to-one push failed"
            ),
        }
    }

    pub fn send_group(&self, req: &C2GSendRequest) -> Result<C2GSendResponse, ServerError> {
        let reply = |status, msg_id| C2GSendResponse {
            status,
            msg_id,
            ts: now_millis(),
            seq: req.seq,
        };

        if req.group.is_empty() || req.content.is_empty() {
            return Ok(reply(STATUS_INVALID_REQUEST, 0));
        }

        let members: Vec<String> = self
            .store
            .group_members(&req.group)?
            .into_iter()
            .filter(|m| *m != req.from)
            .collect();
        if members.is_empty() {
            debug!(group = %req.group, "Group has no other members");
            return Ok(reply(STATUS_GROUP_NOT_FOUND, 0));
        }

        let msg_id = self.store.save_message(
            &NewMessage {
                from: &req.from,
                to: &req.group,
                content: &req.content,
                seq: req.seq,
                send_time: send_time(req.ts),
                kind: MessageKind::C2G,
            },
            &members,
        )?;

        debug!(
            from = %req.from,
            group = %req.group,
            msg_id,
            recipients = members.len(),
            "Group message stored"
        );

        for (addr, uids) in self.partition_by_gate(&members) {
            let this = self.clone();
            let template = C2GPushRequest {
                from: req.from.clone(),
                to: String::new(),
                seq: req.seq.wrapping_add(1),
                group: req.group.clone(),
                content: req.content.clone(),
                msg_id,
                ts: now_millis(),
            };
            self.spawn_delivery(async move { this.deliver_group(addr, uids, template).await });
        }

        Ok(reply(STATUS_OK, msg_id))
    }

    /// Online members grouped by the gate serving them.
    fn partition_by_gate(&self, members: &[String]) -> BTreeMap<String, Vec<String>> {
        let mut by_gate: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for uid in members {
            match self.presence.get(uid) {
                Ok(Some(addr)) => by_gate.entry(addr).or_default().push(uid.clone()),
                Ok(None) => {}
                Err(e) => warn!(uid = %uid, error = %e, "Presence lookup failed"),
            }
        }
        by_gate
    }

    /// Push to every member on one gate in turn, continuing past failures.
    async fn deliver_group(&self, addr: String, uids: Vec<String>, template: C2GPushRequest) {
        let mut failed = 0usize;
        for uid in &uids {
            let push = C2GPushRequest {
                to: uid.clone(),
                ..template.clone()
            };
            if let Err(e) = self.push.c2g_push(&addr, &push).await {
                failed += 1;
                warn!(
                    to = %uid,
                    gate = %addr,
                    msg_id = push.msg_id,
                    error = %e,
                    "Group push failed"
                );
            }
        }
        debug!(
            gate = %addr,
            group = %template.group,
            delivered = uids.len() - failed,
            failed,
            "Group fan-out to gate finished"
        );
    }

    // -----------------------------------------------------------------------
    // Group membership
    // -----------------------------------------------------------------------

    pub fn join_group(&self, req: &GroupMemberRequest) -> Result<GroupMemberResponse, ServerError> {
        if req.group.is_empty() || !self.policy.accepts(&req.uid) {
            return Ok(membership_reply(STATUS_INVALID_REQUEST, false));
        }
        let changed = self.store.add_group_member(&req.group, &req.uid)?;
        debug!(group = %req.group, uid = %req.uid, changed, "Group join");
        Ok(membership_reply(STATUS_OK, changed))
    }

    pub fn leave_group(&self, req: &GroupMemberRequest) -> Result<GroupMemberResponse, ServerError> {
        let changed = self.store.remove_group_member(&req.group, &req.uid)?;
        debug!(group = %req.group, uid = %req.uid, changed, "Group leave");
        Ok(membership_reply(STATUS_OK, changed))
    }

    // -----------------------------------------------------------------------
    // Catch-up and acknowledgment
    // -----------------------------------------------------------------------

    /// Unread messages for `req.uid`, oldest first. Everything returned is
    /// marked read.
    pub fn pull(&self, req: &PullRequest) -> Result<PullResponse, ServerError> {
        let unread = self.store.unread_for(&req.uid, req.msg_id, req.limit)?;
        let ts = now_millis();

        let mut msgs = Vec::with_capacity(unread.len());
        for message in unread {
            self.store.mark_read(message.msg_id, &req.uid)?;
            msgs.push(PullMsg {
                msg_id: message.msg_id,
                seq: message.seq,
                from: message.from,
                group: match message.kind {
                    MessageKind::C2G => Some(message.to),
                    MessageKind::C2C => None,
                },
                content: message.content,
                send_time: message.send_time,
                ts,
            });
        }

        debug!(uid = %req.uid, after = req.msg_id, returned = msgs.len(), "Pull served");

        Ok(PullResponse {
            ts,
            seq: req.seq,
            msgs,
        })
    }

    /// Mark `req.uid`'s receipt for `req.msg_id` read.
    pub fn acknowledge(&self, req: &AckRequest) -> Result<AckResponse, ServerError> {
        if !self.store.mark_read(req.msg_id, &req.uid)? {
            debug!(uid = %req.uid, msg_id = req.msg_id, "Ack for unknown or already read receipt");
        }
        Ok(AckResponse {
            ts: now_millis(),
            seq: req.seq,
        })
    }

    fn spawn_delivery<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.deliveries.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            task.await;
        });
    }
}

fn membership_reply(status: i32, changed: bool) -> GroupMemberResponse {
    GroupMemberResponse {
        status,
        changed,
        ts: now_millis(),
    }
}

/// Sender-reported time, or now when the client left it unset.
fn send_time(ts: i64) -> i64 {
    if ts > 0 {
        ts
    } else {
        now_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use courier_store::{Store, StoreError};

    use crate::policy::DefaultIdentityPolicy;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Pushed {
        KickOut { addr: String, uid: String },
        C2C { addr: String, req: C2CPushRequest, persisted: bool },
        C2G { addr: String, req: C2GPushRequest },
    }

    /// Records every push; fails those aimed at `failing` users.
    struct RecordingPush {
        store: Arc<Store>,
        failing: Mutex<HashSet<String>>,
        /// Gate the user signs in on while its kick-out push is in flight.
        reauth_during_kick: Mutex<Option<String>>,
        events: mpsc::UnboundedSender<Pushed>,
    }

    impl RecordingPush {
        fn new(store: Arc<Store>, events: mpsc::UnboundedSender<Pushed>) -> Self {
            Self {
                store,
                failing: Mutex::new(HashSet::new()),
                reauth_during_kick: Mutex::new(None),
                events,
            }
        }

        fn fail_for(&self, uid: &str) {
            self.failing.lock().unwrap().insert(uid.to_string());
        }

        fn check(&self, uid: &str) -> Result<PushAck, ServerError> {
            if self.failing.lock().unwrap().contains(uid) {
                Err(ServerError::BadRequest(format!("gate refused {uid}")))
            } else {
                Ok(PushAck::now())
            }
        }
    }

    #[async_trait]
    impl PushClient for RecordingPush {
        async fn kick_out(&self, addr: &str, req: &KickOutRequest) -> Result<PushAck, ServerError> {
            let _ = self.events.send(Pushed::KickOut {
                addr: addr.into(),
                uid: req.uid.clone(),
            });
            if let Some(gate) = self.reauth_during_kick.lock().unwrap().take() {
                self.store.set(&req.uid, &gate).unwrap();
            }
            self.check(&req.uid)
        }

        async fn c2c_push(&self, addr: &str, req: &C2CPushRequest) -> Result<PushAck, ServerError> {
            let persisted = self
                .store
                .unread_for(&req.to, 0, 0)
                .unwrap()
                .iter()
                .any(|m| m.msg_id == req.msg_id);
            let _ = self.events.send(Pushed::C2C {
                addr: addr.into(),
                req: req.clone(),
                persisted,
            });
            self.check(&req.to)
        }

        async fn c2g_push(&self, addr: &str, req: &C2GPushRequest) -> Result<PushAck, ServerError> {
            let _ = self.events.send(Pushed::C2G {
                addr: addr.into(),
                req: req.clone(),
            });
            self.check(&req.to)
        }
    }

    /// A store whose writes always fail.
    struct BrokenStore;

    impl MessageStore for BrokenStore {
        fn save_message(&self, _: &NewMessage<'_>, _: &[String]) -> Result<i64, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn mark_read(&self, _: i64, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn unread_for(
            &self,
            _: &str,
            _: i64,
            _: u32,
        ) -> Result<Vec<courier_store::Message>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn group_members(&self, _: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn add_group_member(&self, _: &str, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Poisoned)
        }
        fn remove_group_member(&self, _: &str, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    struct Harness {
        service: RoutingService,
        store: Arc<Store>,
        push: Arc<RecordingPush>,
        events: mpsc::UnboundedReceiver<Pushed>,
    }

    fn harness() -> Harness {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let (tx, events) = mpsc::unbounded_channel();
        let push = Arc::new(RecordingPush::new(store.clone(), tx));
        let service = RoutingService::new(
            store.clone(),
            store.clone(),
            push.clone(),
            Arc::new(DefaultIdentityPolicy),
            4,
        );
        Harness {
            service,
            store,
            push,
            events,
        }
    }

    async fn next_push(events: &mut mpsc::UnboundedReceiver<Pushed>) -> Pushed {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("expected a push")
            .unwrap()
    }

    async fn assert_no_push(events: &mut mpsc::UnboundedReceiver<Pushed>) {
        let waited = tokio::time::timeout(Duration::from_millis(100), events.recv()).await;
        assert!(waited.is_err(), "unexpected push: {waited:?}");
    }

    fn auth(service: &RoutingService, uid: &str, addr: &str) -> AuthResponse {
        service
            .authenticate(
                &AuthRequest {
                    uid: uid.into(),
                    seq: 1,
                },
                addr,
            )
            .unwrap()
    }

    fn c2c(from: &str, to: &str, content: &str, seq: i64) -> C2CSendRequest {
        C2CSendRequest {
            from: from.into(),
            to: to.into(),
            content: content.into(),
            seq,
            ts: now_millis(),
        }
    }

    fn group_send(from: &str, group: &str, content: &str) -> C2GSendRequest {
        C2GSendRequest {
            from: from.into(),
            group: group.into(),
            content: content.into(),
            seq: 5,
            ts: now_millis(),
        }
    }

    fn pull(uid: &str, after: i64) -> PullRequest {
        PullRequest {
            uid: uid.into(),
            msg_id: after,
            limit: 0,
            seq: 9,
        }
    }

    #[tokio::test]
    async fn test_auth_records_presence() {
        let h = harness();
        let rsp = auth(&h.service, "alice", "10.0.0.1:9000");
        assert_eq!(rsp.status, STATUS_OK);
        assert_eq!(rsp.msg, "Success");
        assert_eq!(rsp.seq, 1);
        assert_eq!(
            PresenceDirectory::get(&*h.store, "alice").unwrap().as_deref(),
            Some("10.0.0.1:9000")
        );
    }

    #[tokio::test]
    async fn test_rejected_auth_leaves_no_presence() {
        let h = harness();
        let rsp = auth(&h.service, "bad user", "10.0.0.1:9000");
        assert_eq!(rsp.status, STATUS_INVALID_USER);
        assert!(!h.store.exists("bad user").unwrap());
    }

    #[tokio::test]
    async fn test_reauth_elsewhere_last_write_wins() {
        let h = harness();
        auth(&h.service, "alice", "10.0.0.1:9000");
        auth(&h.service, "alice", "10.0.0.2:9000");
        assert_eq!(
            PresenceDirectory::get(&*h.store, "alice").unwrap().as_deref(),
            Some("10.0.0.2:9000")
        );
    }

    #[tokio::test]
    async fn test_kick_out_is_idempotent() {
        let mut h = harness();
        auth(&h.service, "bob", "10.0.0.2:9000");

        assert!(h.service.kick_out("bob", KICK_REASON_LOGOUT).await.unwrap());
        assert_eq!(
            next_push(&mut h.events).await,
            Pushed::KickOut {
                addr: "10.0.0.2:9000".into(),
                uid: "bob".into()
            }
        );
        assert!(!h.store.exists("bob").unwrap());

        assert!(!h.service.kick_out("bob", KICK_REASON_LOGOUT).await.unwrap());
        assert_no_push(&mut h.events).await;
        assert!(!h.store.exists("bob").unwrap());
    }

    #[tokio::test]
    async fn test_kick_out_clears_presence_even_if_push_fails() {
        let mut h = harness();
        auth(&h.service, "bob", "10.0.0.2:9000");
        h.push.fail_for("bob");

        assert!(h.service.kick_out("bob", KICK_REASON_LOGOUT).await.unwrap());
        next_push(&mut h.events).await;
        assert!(!h.store.exists("bob").unwrap());
    }

    #[tokio::test]
    async fn test_logout_returns_before_kick_out() {
        let mut h = harness();
        auth(&h.service, "bob", "10.0.0.2:9000");

        let rsp = h.service.logout(&LogoutRequest {
            uid: "bob".into(),
            seq: 3,
        });
        assert_eq!(rsp.seq, 3);

        assert!(matches!(next_push(&mut h.events).await, Pushed::KickOut { .. }));
        for _ in 0..100 {
            if !h.store.exists("bob").unwrap() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("presence entry was never removed");
    }

    #[tokio::test]
    async fn test_c2c_persists_before_push() {
        let mut h = harness();
        auth(&h.service, "bob", "10.0.0.2:9000");

        let rsp = h.service.send_c2c(&c2c("alice", "bob", "hi", 1)).unwrap();
        assert_eq!(rsp.status, STATUS_OK);
        assert!(rsp.msg_id > 0);

        match next_push(&mut h.events).await {
            Pushed::C2C {
                addr,
                req,
                persisted,
            } => {
                assert_eq!(addr, "10.0.0.2:9000");
                assert_eq!(req.msg_id, rsp.msg_id);
                assert_eq!(req.seq, 2);
                assert!(persisted);
            }
            other => panic!("unexpected push {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_c2c_push_failure_keeps_single_stored_copy() {
        let mut h = harness();
        auth(&h.service, "bob", "10.0.0.2:9000");
        h.push.fail_for("bob");

        let rsp = h.service.send_c2c(&c2c("alice", "bob", "hi", 1)).unwrap();
        assert_eq!(rsp.status, STATUS_OK);
        next_push(&mut h.events).await;

        assert_eq!(h.store.with_db(|db| db.message_count()).unwrap(), 1);
        let pulled = h.service.pull(&pull("bob", 0)).unwrap();
        assert_eq!(pulled.msgs.len(), 1);
        assert_eq!(pulled.msgs[0].msg_id, rsp.msg_id);
    }

    #[tokio::test]
    async fn test_c2c_to_offline_user_is_stored_only() {
        let mut h = harness();
        let rsp = h.service.send_c2c(&c2c("alice", "carol", "later", 1)).unwrap();
        assert_eq!(rsp.status, STATUS_OK);
        assert_no_push(&mut h.events).await;

        let pulled = h.service.pull(&pull("carol", 0)).unwrap();
        assert_eq!(pulled.msgs[0].content, "later");
        assert_eq!(pulled.msgs[0].group, None);
    }

    #[tokio::test]
    async fn test_c2c_rejects_empty_fields() {
        let h = harness();
        let rsp = h.service.send_c2c(&c2c("alice", "", "hi", 1)).unwrap();
        assert_eq!(rsp.status, STATUS_INVALID_REQUEST);
        let rsp = h.service.send_c2c(&c2c("alice", "bob", "", 1)).unwrap();
        assert_eq!(rsp.status, STATUS_INVALID_REQUEST);
        assert_eq!(h.store.with_db(|db| db.message_count()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_surfaced() {
        let (tx, _events) = mpsc::unbounded_channel();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let push = Arc::new(RecordingPush::new(store.clone(), tx));
        let service = RoutingService::new(
            Arc::new(BrokenStore),
            store,
            push,
            Arc::new(DefaultIdentityPolicy),
            4,
        );

        let result = service.send_c2c(&c2c("alice", "bob", "hi", 1));
        assert!(matches!(result, Err(ServerError::Store(_))));
        assert!(service.pull(&pull("bob", 0)).is_err());
    }

    #[tokio::test]
    async fn test_group_fan_out_survives_one_failure() {
        let mut h = harness();
        for uid in ["alice", "bob", "carol", "dave", "erin"] {
            h.store.add_group_member("room", uid).unwrap();
        }
        auth(&h.service, "bob", "gate-a:9000");
        auth(&h.service, "carol", "gate-a:9000");
        auth(&h.service, "dave", "gate-b:9000");
        // erin is offline
        h.push.fail_for("bob");

        let rsp = h.service.send_group(&group_send("alice", "room", "hello")).unwrap();
        assert_eq!(rsp.status, STATUS_OK);

        let mut delivered = Vec::new();
        for _ in 0..3 {
            match next_push(&mut h.events).await {
                Pushed::C2G { addr, req } => {
                    assert_eq!(req.msg_id, rsp.msg_id);
                    assert_eq!(req.group, "room");
                    assert_eq!(req.seq, 6);
                    delivered.push((addr, req.to));
                }
                other => panic!("unexpected push {other:?}"),
            }
        }
        assert_no_push(&mut h.events).await;

        delivered.sort();
        assert_eq!(
            delivered,
            vec![
                ("gate-a:9000".to_string(), "bob".to_string()),
                ("gate-a:9000".to_string(), "carol".to_string()),
                ("gate-b:9000".to_string(), "dave".to_string()),
            ]
        );

        // Everyone except the sender holds a receipt.
        for uid in ["bob", "carol", "dave", "erin"] {
            let pulled = h.service.pull(&pull(uid, 0)).unwrap();
            assert_eq!(pulled.msgs.len(), 1, "{uid}");
            assert_eq!(pulled.msgs[0].group.as_deref(), Some("room"));
        }
        assert!(h.service.pull(&pull("alice", 0)).unwrap().msgs.is_empty());
    }

    #[tokio::test]
    async fn test_group_without_other_members() {
        let h = harness();
        h.store.add_group_member("solo", "alice").unwrap();

        let rsp = h.service.send_group(&group_send("alice", "solo", "echo")).unwrap();
        assert_eq!(rsp.status, STATUS_GROUP_NOT_FOUND);
        let rsp = h.service.send_group(&group_send("alice", "missing", "echo")).unwrap();
        assert_eq!(rsp.status, STATUS_GROUP_NOT_FOUND);
        assert_eq!(h.store.with_db(|db| db.message_count()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pull_marks_read_and_orders_by_id() {
        let h = harness();
        let first = h.service.send_c2c(&c2c("alice", "bob", "one", 1)).unwrap();
        let second = h.service.send_c2c(&c2c("carol", "bob", "two", 1)).unwrap();
        let third = h.service.send_c2c(&c2c("alice", "bob", "three", 2)).unwrap();

        let limited = h
            .service
            .pull(&PullRequest {
                uid: "bob".into(),
                msg_id: first.msg_id,
                limit: 1,
                seq: 4,
            })
            .unwrap();
        assert_eq!(limited.seq, 4);
        assert_eq!(limited.msgs.len(), 1);
        assert_eq!(limited.msgs[0].msg_id, second.msg_id);

        let rest = h.service.pull(&pull("bob", 0)).unwrap();
        let ids: Vec<i64> = rest.msgs.iter().map(|m| m.msg_id).collect();
        assert_eq!(ids, vec![first.msg_id, third.msg_id]);

        assert!(h.service.pull(&pull("bob", 0)).unwrap().msgs.is_empty());
    }

    #[tokio::test]
    async fn test_ack_only_affects_acking_recipient() {
        let h = harness();
        for uid in ["alice", "bob", "carol"] {
            h.store.add_group_member("room", uid).unwrap();
        }
        let rsp = h.service.send_group(&group_send("alice", "room", "hey")).unwrap();

        let ack = h
            .service
            .acknowledge(&AckRequest {
                uid: "bob".into(),
                msg_id: rsp.msg_id,
                seq: 6,
            })
            .unwrap();
        assert_eq!(ack.seq, 6);

        assert!(h.service.pull(&pull("bob", 0)).unwrap().msgs.is_empty());
        assert_eq!(h.service.pull(&pull("carol", 0)).unwrap().msgs.len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_send_ack_pull() {
        let mut h = harness();
        auth(&h.service, "A", "X:9000");
        auth(&h.service, "B", "Y:9000");

        let rsp = h.service.send_c2c(&c2c("A", "B", "hi", 1)).unwrap();
        assert_eq!(rsp.status, STATUS_OK);

        let receipt = h
            .store
            .with_db(|db| db.get_receipt(rsp.msg_id, "B"))
            .unwrap();
        assert!(!receipt.read);

        match next_push(&mut h.events).await {
            Pushed::C2C { addr, req, .. } => {
                assert_eq!(addr, "Y:9000");
                assert_eq!(req.seq, 2);
                assert_eq!(req.msg_id, rsp.msg_id);
                assert_eq!(req.content, "hi");
            }
            other => panic!("unexpected push {other:?}"),
        }

        h.service
            .acknowledge(&AckRequest {
                uid: "B".into(),
                msg_id: rsp.msg_id,
                seq: 2,
            })
            .unwrap();
        let receipt = h
            .store
            .with_db(|db| db.get_receipt(rsp.msg_id, "B"))
            .unwrap();
        assert!(receipt.read);

        let pulled = h.service.pull(&pull("B", 0)).unwrap();
        assert!(pulled.msgs.iter().all(|m| m.msg_id != rsp.msg_id));
    }

    #[tokio::test]
    async fn test_c2c_max_seq_wraps_instead_of_panicking() {
        let mut h = harness();
        auth(&h.service, "bob", "10.0.0.2:9000");

        let rsp = h.service.send_c2c(&c2c("alice", "bob", "hi", i64::MAX)).unwrap();
        assert_eq!(rsp.status, STATUS_OK);
        assert_eq!(rsp.seq, i64::MAX);

        match next_push(&mut h.events).await {
            Pushed::C2C { req, .. } => assert_eq!(req.seq, i64::MIN),
            other => panic!("unexpected push {other:?}"),
        }
        assert_eq!(h.store.with_db(|db| db.message_count()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_group_max_seq_wraps_instead_of_panicking() {
        let mut h = harness();
        h.store.add_group_member("room", "alice").unwrap();
        h.store.add_group_member("room", "bob").unwrap();
        auth(&h.service, "bob", "10.0.0.2:9000");

        let mut req = group_send("alice", "room", "hello");
        req.seq = i64::MAX;
        let rsp = h.service.send_group(&req).unwrap();
        assert_eq!(rsp.status, STATUS_OK);

        match next_push(&mut h.events).await {
            Pushed::C2G { req, .. } => assert_eq!(req.seq, i64::MIN),
            other => panic!("unexpected push {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_group_send_is_all_or_nothing() {
        let mut h = harness();
        for uid in ["alice", "bob", "carol"] {
            h.store.add_group_member("room", uid).unwrap();
        }
        auth(&h.service, "bob", "10.0.0.2:9000");
        h.store
            .with_db(|db| {
                db.conn().execute_batch(
                    "CREATE TRIGGER refuse_carol BEFORE INSERT ON receipts
                     WHEN NEW.msg_to = 'carol'
                     BEGIN SELECT RAISE(ABORT, 'receipt refused'); END;",
                )?;
                Ok(())
            })
            .unwrap();

        let result = h.service.send_group(&group_send("alice", "room", "hello"));
        assert!(matches!(result, Err(ServerError::Store(_))));

        assert_eq!(h.store.with_db(|db| db.message_count()).unwrap(), 0);
        assert!(h.service.pull(&pull("bob", 0)).unwrap().msgs.is_empty());
        assert_no_push(&mut h.events).await;
    }

    #[tokio::test]
    async fn test_kick_out_keeps_newer_registration() {
        let mut h = harness();
        auth(&h.service, "bob", "10.0.0.2:9000");
        *h.push.reauth_during_kick.lock().unwrap() = Some("10.0.0.3:9000".into());

        assert!(h.service.kick_out("bob", KICK_REASON_LOGOUT).await.unwrap());
        next_push(&mut h.events).await;

        assert_eq!(
            PresenceDirectory::get(&*h.store, "bob").unwrap().as_deref(),
            Some("10.0.0.3:9000")
        );
    }

    #[tokio::test]
    async fn test_join_and_leave_group() {
        let h = harness();
        let join = |group: &str, uid: &str| {
            h.service
                .join_group(&GroupMemberRequest {
                    group: group.into(),
                    uid: uid.into(),
                })
                .unwrap()
        };

        assert!(join("room", "alice").changed);
        assert!(join("room", "bob").changed);
        assert!(!join("room", "bob").changed);
        assert_eq!(join("room", "not valid").status, STATUS_INVALID_REQUEST);
        assert_eq!(join("", "carol").status, STATUS_INVALID_REQUEST);

        let rsp = h.service.send_group(&group_send("alice", "room", "hi")).unwrap();
        assert_eq!(rsp.status, STATUS_OK);

        let left = h
            .service
            .leave_group(&GroupMemberRequest {
                group: "room".into(),
                uid: "bob".into(),
            })
            .unwrap();
        assert!(left.changed);

        let rsp = h.service.send_group(&group_send("alice", "room", "again")).unwrap();
        assert_eq!(rsp.status, STATUS_GROUP_NOT_FOUND);
    }
}
