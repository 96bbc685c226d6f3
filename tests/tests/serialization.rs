use cucp::protocols::ngap::{PduSessionResourceModifyItem, PduSessionResourceModifyRequest};
use cucp_tests::{DuFaults, Event, framework::*};
use xxap::{PduSessionId, QosFlowId};

#[async_std::test]
async fn procedures_for_one_ue_run_in_arrival_order() -> anyhow::Result<()> {
    let t = init()?;
    let ue = t.attached_ue_with_sessions(&[1]).await?;

    // Given a DU that is slow to answer
    t.du1.set_faults(DuFaults {
        modification_delay_ms: 100,
        ..Default::default()
    });

    // When a setup and a modify for the same UE arrive back to back
    let setup = t
        .cucp
        .handle_pdu_session_resource_setup_request(setup_request(ue, vec![session(2, 9)]));
    let modify = t
        .cucp
        .handle_pdu_session_resource_modify_request(PduSessionResourceModifyRequest {
            ue_index: ue,
            pdu_sessions: vec![PduSessionResourceModifyItem {
                pdu_session_id: PduSessionId(1),
                qos_flows_to_add_or_modify: vec![qos_flow(3, 9)],
                qos_flows_to_release: vec![],
                nas_pdu: None,
            }],
        });
    let (setup_rsp, modify_rsp) = futures::join!(setup, modify);

    // Then the modify only starts once the setup has finished
    assert_eq!(setup_rsp.pdu_sessions_setup.len(), 1);
    assert_eq!(modify_rsp.pdu_sessions_modified.len(), 1);
    assert_eq!(
        t.events.signaling_for(ue),
        vec![
            Event::E1BearerContextModification(ue),
            Event::F1UeContextModification(ue),
            Event::E1BearerContextModification(ue),
            Event::RrcReconfiguration(ue),
            Event::E1BearerContextModification(ue),
            Event::RrcReconfiguration(ue),
        ]
    );

    let up = t.cucp.ue_up_context(ue).unwrap();
    assert!(up.is_consistent());
    assert_eq!(up.pdu_sessions.len(), 2);
    assert!(up.qos_flow_map.contains_key(&QosFlowId(3)));
    Ok(())
}

#[async_std::test]
async fn different_ues_do_not_wait_for_each_other() -> anyhow::Result<()> {
    let t = init()?;
    let slow_ue = t.attached_ue_with_sessions(&[1]).await?;
    let other_ue = t.new_ue(t.du2_index, DU2_CELL).await?;
    t.attach(other_ue).await?;

    // Given a procedure on one UE that is stuck waiting for DU 1
    t.du1.set_faults(DuFaults {
        modification_delay_ms: 300,
        ..Default::default()
    });
    let cucp = t.cucp.clone();
    let stuck = async_std::task::spawn(async move {
        cucp.handle_pdu_session_resource_setup_request(setup_request(
            slow_ue,
            vec![session(2, 9)],
        ))
        .await
    });
    t.wait_until("slow UE at DU", |t| {
        t.events.contains(&Event::F1UeContextModification(slow_ue))
    })
    .await?;

    // When a UE on DU 2 sets up a session
    let rsp = t
        .cucp
        .handle_pdu_session_resource_setup_request(setup_request(other_ue, vec![session(1, 9)]))
        .await;

    // Then it completes while the first UE is still waiting
    assert_eq!(rsp.pdu_sessions_setup.len(), 1);
    assert!(!t.events.contains(&Event::RrcReconfiguration(slow_ue)));

    let rsp = stuck.await;
    assert_eq!(rsp.pdu_sessions_setup.len(), 1);
    Ok(())
}
