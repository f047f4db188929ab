#[cfg(test)]
mod tests {
    use crate::*;
    use proptest::prelude::*;

    fn actor(id: u64, name: &str) -> ActorId {
        ActorId::new(id, name)
    }

    fn event(repr: &str, sender: &ActorId) -> EventSnapshot {
        EventSnapshot::capture(&repr).with_sender(sender.clone(), Some("Init".into()))
    }

    fn assert_linked(trace: &BugTrace) {
        let n = trace.len();
        for (i, step) in trace.iter().enumerate() {
            assert_eq!(step.index(), i);
            assert_eq!(step.previous(), if i == 0 { None } else { Some(i - 1) });
            assert_eq!(step.next(), if i + 1 == n { None } else { Some(i + 1) });
        }
    }

    #[test]
    fn test_add_steps_links_records() {
        let harness = actor(0, "Harness");
        let server = actor(1, "Server");
        let mut trace = BugTrace::new();
        trace.add_create_machine_step(Some(&harness), Some("Init"), &server, None);
        trace.add_send_event_step(
            &harness,
            Some("Init"),
            event("Ping", &harness),
            &server,
            None,
            Some("Init"),
        );
        trace.add_dequeue_event_step(&server, "Init", event("Ping", &harness), None);
        trace.add_goto_state_step(&server, "Active");
        trace.add_halt_step(&server, "Active");

        assert_eq!(trace.len(), 5);
        assert_linked(&trace);
        assert_eq!(trace[0].kind, StepKind::CreateMachine);
        assert_eq!(trace[0].target, Some(server.clone()));
        assert_eq!(trace[1].target_state_info.as_deref(), Some("Init"));
        assert_eq!(trace[4].kind, StepKind::Halt);
    }

    #[test]
    fn test_unused_fields_stay_empty() {
        let a = actor(3, "Client");
        let mut trace = BugTrace::new();
        trace.add_invoke_action_step(&a, "Waiting", "OnTimeout");
        trace.add_wait_to_receive_step(&a, "Waiting", "Ack, Nack");
        trace.add_random_bool_choice_step(&a, "Waiting", true);
        trace.add_random_int_choice_step(&a, "Waiting", 7);

        assert_eq!(trace[0].action.as_deref(), Some("OnTimeout"));
        assert!(trace[0].event.is_none());
        assert!(trace[0].choice.is_none());
        assert_eq!(trace[1].awaited_events.as_deref(), Some("Ack, Nack"));
        assert!(trace[1].action.is_none());
        assert_eq!(trace[2].choice, Some(Choice::Bool(true)));
        assert_eq!(trace[3].choice, Some(Choice::Int(7)));
        assert!(trace[3].target.is_none());
    }

    #[test]
    fn test_create_monitor_has_only_target() {
        let mut trace = BugTrace::new();
        trace.add_create_monitor_step(&actor(9, "Liveness"));
        let step = trace.peek().unwrap();
        assert_eq!(step.kind, StepKind::CreateMonitor);
        assert!(step.actor.is_none());
        assert_eq!(step.target.as_ref().map(|t| t.id), Some(9));
    }

    #[test]
    fn test_pop_then_peek() {
        let a = actor(1, "A");
        let mut trace = BugTrace::new();
        trace.add_goto_state_step(&a, "S1");
        trace.add_goto_state_step(&a, "S2");
        trace.add_goto_state_step(&a, "S3");

        let popped = trace.pop().unwrap();
        assert_eq!(popped.index(), 2);
        assert_eq!(popped.next(), None);
        assert_eq!(popped.actor_state.as_deref(), Some("S3"));

        let last = trace.peek().unwrap();
        assert_eq!(last.index(), 1);
        assert_eq!(last.next(), None);
        assert_linked(&trace);
    }

    #[test]
    fn test_pop_empty_fails() {
        let mut trace = BugTrace::new();
        assert!(matches!(trace.pop(), Err(TraceError::EmptyTrace)));
        assert!(trace.peek().is_none());
    }

    #[test]
    fn test_push_after_pop_reuses_index() {
        let a = actor(1, "A");
        let mut trace = BugTrace::new();
        trace.add_goto_state_step(&a, "S1");
        trace.add_goto_state_step(&a, "S2");
        trace.pop().unwrap();
        let idx = trace.add_halt_step(&a, "S1");
        assert_eq!(idx, 1);
        assert_linked(&trace);
    }

    #[test]
    fn test_replace_dequeued_state_without_dequeue_fails() {
        let a = actor(1, "A");
        let b = actor(2, "B");
        let mut trace = BugTrace::new();
        trace.add_dequeue_event_step(&b, "Init", event("E", &a), None);
        trace.add_goto_state_step(&a, "Next");

        let err = trace.replace_dequeued_actor_state_info(&a, "Next").unwrap_err();
        assert!(matches!(err, TraceError::MissingDequeue { actor } if actor == a));
    }

    #[test]
    fn test_replace_dequeued_state_patches_latest_only() {
        let a = actor(1, "A");
        let b = actor(2, "B");
        let mut trace = BugTrace::new();
        trace.add_dequeue_event_step(&b, "Init", event("E1", &a), Some("Init"));
        trace.add_dequeue_event_step(&a, "Init", event("E2", &b), None);
        trace.add_dequeue_event_step(&b, "Ready", event("E3", &a), None);
        trace.add_goto_state_step(&b, "Done");

        trace.replace_dequeued_actor_state_info(&b, "Done").unwrap();

        assert_eq!(trace[0].state_info.as_deref(), Some("Init"));
        assert_eq!(trace[1].state_info, None);
        assert_eq!(trace[2].state_info.as_deref(), Some("Done"));
        assert_eq!(trace[2].actor_state.as_deref(), Some("Ready"));
    }

    #[test]
    fn test_visualization_empty_trace() {
        assert_eq!(BugTrace::new().to_visualization_format(), "");
    }

    #[test]
    fn test_visualization_single_dequeue_without_state() {
        let a = actor(1, "A");
        let b = actor(2, "B");
        let mut trace = BugTrace::new();
        trace.add_dequeue_event_step(&b, "Init", event("M", &a), None);

        let expected = "[\n  {\n    \"From\": \"A(1)\",\n    \"To\": \"B(2)\",\n    \"Message\": \"M\"\n  }\n]\n";
        assert_eq!(trace.to_visualization_format(), expected);
    }

    #[test]
    fn test_visualization_with_state_and_separators() {
        let a = actor(1, "A");
        let b = actor(2, "B");
        let mut trace = BugTrace::new();
        trace.add_send_event_step(&a, Some("Init"), event("M", &a), &b, None, None);
        trace.add_dequeue_event_step(&b, "Init", event("M", &a), None);
        trace.replace_dequeued_actor_state_info(&b, "Busy").unwrap();
        trace.add_dequeue_event_step(&a, "Init", event("Reply", &b), Some(""));
        trace.add_halt_step(&a, "Init");

        let out = trace.to_visualization_format();
        let expected = concat!(
            "[\n",
            "  {\n",
            "    \"From\": \"A(1)\",\n",
            "    \"To\": \"B(2)\",\n",
            "    \"Message\": \"M\",\n",
            "    \"State\":\n",
            "    {\n",
            "    \"B(2)\": \"Busy\"\n",
            "    }\n",
            "  },\n",
            "  {\n",
            "    \"From\": \"B(2)\",\n",
            "    \"To\": \"A(1)\",\n",
            "    \"Message\": \"Reply\"\n",
            "  }\n",
            "]\n",
        );
        assert_eq!(out, expected);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_visualization_escapes_payloads() {
        let a = actor(1, "A");
        let mut trace = BugTrace::new();
        trace.add_dequeue_event_step(&a, "Init", event("Msg(\"x\")", &a), None);
        let parsed: serde_json::Value =
            serde_json::from_str(&trace.to_visualization_format()).unwrap();
        assert_eq!(parsed[0]["Message"], "Msg(\"x\")");
    }

    #[test]
    fn test_visualization_escapes_control_characters() {
        let a = actor(1, "A");
        let mut trace = BugTrace::new();
        trace.add_dequeue_event_step(&a, "Init", event("line\nbreak", &a), Some("tab\there"));
        let out = trace.to_visualization_format();
        assert!(out.contains("    \"Message\": \"line\\nbreak\",\n"));
        assert!(out.contains("    \"A(1)\": \"tab\\there\"\n"));
    }

    #[test]
    fn test_json_roundtrip_relinks() {
        let a = actor(1, "A");
        let b = actor(2, "B");
        let mut trace = BugTrace::new();
        trace.add_create_machine_step(None, None, &a, None);
        trace.add_send_event_step(&a, Some("Init"), event("M", &a), &b, None, None);
        trace.add_random_int_choice_step(&a, "Init", 3);

        let json = trace.to_json().unwrap();
        let restored = BugTrace::from_json(&json).unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(restored.version(), TRACE_FORMAT_VERSION);
        assert_linked(&restored);
        assert_eq!(restored[2].choice, Some(Choice::Int(3)));
    }

    #[test]
    fn test_json_missing_version_defaults() {
        let restored = BugTrace::from_json(r#"{"steps": []}"#).unwrap();
        assert_eq!(restored.version(), TRACE_FORMAT_VERSION);
        assert!(restored.is_empty());
    }

    #[test]
    fn test_json_rejects_future_version() {
        let err = BugTrace::from_json(r#"{"version": 99, "steps": []}"#).unwrap_err();
        assert!(matches!(
            err,
            TraceError::UnsupportedVersion { found: 99, max: 1 }
        ));
    }

    #[test]
    fn test_replay_identical() {
        let a = actor(1, "A");
        let mut original = BugTrace::new();
        original.add_goto_state_step(&a, "S1");
        original.add_random_bool_choice_step(&a, "S1", false);
        let mut replay = BugTrace::new();
        replay.add_goto_state_step(&a, "Renamed");
        replay.add_random_bool_choice_step(&a, "Renamed", false);

        assert!(ReplayEngine::verify(&original, &replay).is_identical());
    }

    #[test]
    fn test_replay_diverged_on_choice() {
        let a = actor(1, "A");
        let mut original = BugTrace::new();
        original.add_random_int_choice_step(&a, "S", 1);
        let mut replay = BugTrace::new();
        replay.add_random_int_choice_step(&a, "S", 2);

        match ReplayEngine::verify(&original, &replay) {
            ReplayResult::Diverged { index, reason } => {
                assert_eq!(index, 0);
                assert!(reason.contains("choice"));
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn test_replay_diverged_on_length() {
        let a = actor(1, "A");
        let mut original = BugTrace::new();
        original.add_goto_state_step(&a, "S");
        original.add_halt_step(&a, "S");
        let mut replay = BugTrace::new();
        replay.add_goto_state_step(&a, "S");

        assert_eq!(
            ReplayEngine::verify(&original, &replay),
            ReplayResult::Diverged {
                index: 1,
                reason: "different step count: 2 vs 1".into(),
            }
        );
    }

    #[test]
    fn test_choice_replayer_feeds_recorded_values() {
        let a = actor(1, "A");
        let b = actor(2, "B");
        let mut trace = BugTrace::new();
        trace.add_random_bool_choice_step(&a, "S", true);
        trace.add_goto_state_step(&a, "T");
        trace.add_random_int_choice_step(&b, "S", 4);

        let mut replayer = ChoiceReplayer::new(&trace);
        assert_eq!(replayer.remaining(), 2);
        assert!(replayer.next_bool(&a).unwrap());
        assert_eq!(replayer.next_int(&b).unwrap(), 4);
        assert_eq!(replayer.remaining(), 0);
        assert!(matches!(
            replayer.next_bool(&a),
            Err(TraceError::ReplayExhausted { .. })
        ));
    }

    #[test]
    fn test_choice_replayer_detects_wrong_actor_and_kind() {
        let a = actor(1, "A");
        let b = actor(2, "B");
        let mut trace = BugTrace::new();
        trace.add_random_bool_choice_step(&a, "S", true);
        trace.add_random_bool_choice_step(&a, "S", false);

        let mut replayer = ChoiceReplayer::new(&trace);
        assert!(matches!(
            replayer.next_bool(&b),
            Err(TraceError::ReplayDiverged { index: 0, .. })
        ));
        assert!(matches!(
            replayer.next_int(&a),
            Err(TraceError::ReplayDiverged { index: 1, .. })
        ));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Goto(u8),
        Dequeue(u8),
        Choice(bool),
        Pop,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4).prop_map(Op::Goto),
            (0u8..4).prop_map(Op::Dequeue),
            any::<bool>().prop_map(Op::Choice),
            Just(Op::Pop),
        ]
    }

    proptest! {
        #[test]
        fn prop_links_hold_under_push_and_pop(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let mut trace = BugTrace::new();
            let mut expected_len = 0usize;
            for op in ops {
                match op {
                    Op::Goto(id) => {
                        trace.add_goto_state_step(&actor(id as u64, "M"), "S");
                        expected_len += 1;
                    }
                    Op::Dequeue(id) => {
                        let a = actor(id as u64, "M");
                        trace.add_dequeue_event_step(&a, "S", event("E", &a), None);
                        expected_len += 1;
                    }
                    Op::Choice(b) => {
                        trace.add_random_bool_choice_step(&actor(0, "M"), "S", b);
                        expected_len += 1;
                    }
                    Op::Pop => {
                        let before = trace.peek().map(|s| s.index());
                        match trace.pop() {
                            Ok(step) => {
                                prop_assert_eq!(Some(step.index()), before);
                                prop_assert_eq!(step.next(), None);
                                expected_len -= 1;
                            }
                            Err(_) => prop_assert_eq!(expected_len, 0),
                        }
                    }
                }
                prop_assert_eq!(trace.len(), expected_len);
                assert_linked(&trace);
            }
        }
    }
}
