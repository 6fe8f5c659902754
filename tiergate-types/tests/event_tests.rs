use tiergate_types::{
    AuditEntry, AuditSink, BroadcastEventBus, Event, EventBus, EventPayload, MemoryAuditSink,
    MemoryEventBus, NullEventBus, Tier, UserId,
};

fn changed(user: i64) -> Event {
    Event::new(EventPayload::MembershipChanged {
        user_id: UserId::new(user),
        old_tier: Some(Tier::Free),
        new_tier: Tier::Gold,
    })
}

#[test]
fn event_name_follows_payload() {
    let event = changed(1);
    assert_eq!(event.name, "membership.changed");

    let expired = Event::new(EventPayload::MembershipExpired {
        user_id: UserId::new(1),
        tier: Tier::Gold,
    });
    assert_eq!(expired.name, "membership.expired");
}

#[test]
fn payload_serializes_with_op_tag() {
    let json = serde_json::to_value(&changed(2).payload).unwrap();
    assert_eq!(json["op"], "MembershipChanged");
    assert_eq!(json["data"]["new_tier"], "gold");
    assert_eq!(json["data"]["user_id"], 2);
}

#[test]
fn broadcast_without_subscribers_does_not_fail() {
    let bus = BroadcastEventBus::new(4);
    assert_eq!(bus.subscriber_count(), 0);
    bus.publish(changed(1));
}

#[test]
fn broadcast_delivers_to_every_subscriber() {
    let bus = BroadcastEventBus::new(8);
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    bus.publish(changed(3));

    assert_eq!(a.try_recv().unwrap().name, "membership.changed");
    assert_eq!(b.try_recv().unwrap().name, "membership.changed");
    assert!(a.try_recv().is_err());
}

#[test]
fn memory_bus_filters_by_name() {
    let bus = MemoryEventBus::new();
    bus.publish(changed(1));
    bus.publish(Event::new(EventPayload::ModuleToggled {
        module_id: "quiz".into(),
        enabled: false,
    }));
    assert_eq!(bus.events().len(), 2);
    assert_eq!(bus.named("module.toggled").len(), 1);
}

#[test]
fn null_bus_accepts_anything() {
    NullEventBus.publish(changed(1));
}

#[test]
fn memory_audit_sink_keeps_order() {
    let sink = MemoryAuditSink::new();
    sink.append(AuditEntry::new(
        "membership.tier_changed",
        "membership",
        "1",
        serde_json::json!({"old": "free", "new": "gold"}),
    ));
    sink.append(AuditEntry::new(
        "membership.expired",
        "membership",
        "1",
        serde_json::Value::Null,
    ));

    let entries = sink.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "membership.tier_changed");
    assert_eq!(entries[0].details["new"], "gold");
    assert_eq!(sink.entries_for("membership.expired").len(), 1);
}
