use cucp::UeIndex;
use cucp::protocols::ngap::{
    PduSessionResourceModifyItem, PduSessionResourceModifyRequest, QosFlowSetupRequestItem,
};
use cucp_tests::{CuUpFaults, Event, framework::*};
use xxap::{Cause, CauseRadioNetwork, DrbId, PduSessionId, QosFlowId};

fn modify_request(
    ue_index: UeIndex,
    id: u8,
    qos_flows_to_add_or_modify: Vec<QosFlowSetupRequestItem>,
    qos_flows_to_release: Vec<u8>,
) -> PduSessionResourceModifyRequest {
    PduSessionResourceModifyRequest {
        ue_index,
        pdu_sessions: vec![PduSessionResourceModifyItem {
            pdu_session_id: PduSessionId(id),
            qos_flows_to_add_or_modify,
            qos_flows_to_release: qos_flows_to_release.into_iter().map(QosFlowId).collect(),
            nas_pdu: Some(vec![0x7e, 0x4d]),
        }],
    }
}

#[async_std::test]
async fn new_five_qi_adds_drb() -> anyhow::Result<()> {
    let t = init()?;

    // Given a UE with a session carrying one 5QI 9 flow on DRB 1
    let ue = t.attached_ue_with_sessions(&[1]).await?;

    // When the AMF adds a 5QI 5 flow
    let rsp = t
        .cucp
        .handle_pdu_session_resource_modify_request(modify_request(
            ue,
            1,
            vec![qos_flow(2, 5)],
            vec![],
        ))
        .await;

    // Then a second DRB is set up at the CU-UP, the DU and the UE
    assert!(rsp.pdu_sessions_failed.is_empty());
    assert_eq!(rsp.pdu_sessions_modified.len(), 1);
    assert_eq!(
        rsp.pdu_sessions_modified[0].qos_flows_added_or_modified,
        vec![QosFlowId(2)]
    );
    assert_eq!(
        t.events.signaling_for(ue),
        vec![
            Event::E1BearerContextModification(ue),
            Event::F1UeContextModification(ue),
            Event::E1BearerContextModification(ue),
            Event::RrcReconfiguration(ue),
        ]
    );
    let e1_request = &t.cu_up.modifications()[0];
    assert_eq!(
        e1_request.pdu_sessions_to_modify[0].drbs_to_setup[0].drb_id,
        DrbId(2)
    );
    let f1_request = t.du1.last_ue_context_modification().unwrap();
    assert_eq!(f1_request.drbs_to_setup.len(), 1);
    assert_eq!(f1_request.drbs_to_setup[0].drb_id, DrbId(2));

    let up = t.cucp.ue_up_context(ue).unwrap();
    assert!(up.is_consistent());
    assert_eq!(up.qos_flow_map[&QosFlowId(2)], DrbId(2));
    let drb = &up.pdu_sessions[&PduSessionId(1)].drbs[&DrbId(2)];
    assert_eq!(drb.dl_up_tnl_information, vec![t.du1.dl_tunnel(ue, DrbId(2))]);
    Ok(())
}

#[async_std::test]
async fn flow_on_existing_five_qi_remaps_drb() -> anyhow::Result<()> {
    let t = init()?;
    let ue = t.attached_ue_with_sessions(&[1]).await?;

    // When the AMF adds a flow with the same 5QI as the existing one
    let rsp = t
        .cucp
        .handle_pdu_session_resource_modify_request(modify_request(
            ue,
            1,
            vec![qos_flow(3, 9)],
            vec![],
        ))
        .await;

    // Then the CU-UP remaps DRB 1 and the DU is left alone
    assert_eq!(rsp.pdu_sessions_modified.len(), 1);
    assert_eq!(
        t.events.signaling_for(ue),
        vec![
            Event::E1BearerContextModification(ue),
            Event::RrcReconfiguration(ue),
        ]
    );
    let e1_request = t.cu_up.last_modification().unwrap();
    let drb = &e1_request.pdu_sessions_to_modify[0].drbs_to_modify[0];
    assert_eq!(drb.drb_id, DrbId(1));
    let mapped: Vec<_> = drb
        .flow_mapping_information
        .as_ref()
        .unwrap()
        .iter()
        .map(|f| f.qos_flow_id)
        .collect();
    assert_eq!(mapped, vec![QosFlowId(1), QosFlowId(3)]);

    // And the UE only gets the NAS PDU
    let (_, reconfiguration) = t.du1.last_reconfiguration().unwrap();
    assert!(reconfiguration.radio_bearer_config.is_none());
    assert_eq!(reconfiguration.nas_pdus, vec![vec![0x7e, 0x4d]]);

    let up = t.cucp.ue_up_context(ue).unwrap();
    assert_eq!(up.qos_flow_map[&QosFlowId(3)], DrbId(1));
    assert_eq!(up.nof_drbs(), 1);
    Ok(())
}

#[async_std::test]
async fn releasing_last_flow_removes_drb() -> anyhow::Result<()> {
    let t = init()?;
    let ue = t.attached_ue_with_sessions(&[]).await?;

    // Given a session with a 5QI 9 flow on DRB 1 and a 5QI 5 flow on DRB 2
    let mut two_flows = session(1, 9);
    two_flows.qos_flows.push(qos_flow(2, 5));
    let rsp = t
        .cucp
        .handle_pdu_session_resource_setup_request(setup_request(ue, vec![two_flows]))
        .await;
    assert!(rsp.pdu_sessions_failed.is_empty());
    assert_eq!(t.cucp.ue_up_context(ue).unwrap().nof_drbs(), 2);
    t.clear_history();

    // When the AMF releases the 5QI 5 flow
    let rsp = t
        .cucp
        .handle_pdu_session_resource_modify_request(modify_request(ue, 1, vec![], vec![2]))
        .await;

    // Then DRB 2 is released everywhere
    assert_eq!(rsp.pdu_sessions_modified.len(), 1);
    assert_eq!(
        rsp.pdu_sessions_modified[0].qos_flows_released,
        vec![QosFlowId(2)]
    );
    assert_eq!(
        t.events.signaling_for(ue),
        vec![
            Event::E1BearerContextModification(ue),
            Event::F1UeContextModification(ue),
            Event::RrcReconfiguration(ue),
        ]
    );
    let e1_request = t.cu_up.last_modification().unwrap();
    assert_eq!(
        e1_request.pdu_sessions_to_modify[0].drbs_to_remove,
        vec![DrbId(2)]
    );
    let f1_request = t.du1.last_ue_context_modification().unwrap();
    assert_eq!(f1_request.drbs_to_release, vec![DrbId(2)]);
    let (_, reconfiguration) = t.du1.last_reconfiguration().unwrap();
    assert_eq!(
        reconfiguration.radio_bearer_config.unwrap().drbs_to_release,
        vec![DrbId(2)]
    );

    let up = t.cucp.ue_up_context(ue).unwrap();
    assert!(up.is_consistent());
    assert_eq!(up.drb_map.keys().copied().collect::<Vec<_>>(), vec![DrbId(1)]);
    assert!(!up.qos_flow_map.contains_key(&QosFlowId(2)));
    Ok(())
}

#[async_std::test]
async fn modify_unknown_session() -> anyhow::Result<()> {
    let t = init()?;
    let ue = t.attached_ue_with_sessions(&[1]).await?;

    let rsp = t
        .cucp
        .handle_pdu_session_resource_modify_request(modify_request(
            ue,
            2,
            vec![qos_flow(2, 9)],
            vec![],
        ))
        .await;

    assert!(rsp.pdu_sessions_modified.is_empty());
    assert_eq!(rsp.pdu_sessions_failed[0].pdu_session_id, PduSessionId(2));
    assert_eq!(
        rsp.pdu_sessions_failed[0].cause,
        Cause::RadioNetwork(CauseRadioNetwork::UnknownPduSessionId)
    );
    assert!(t.events.signaling_for(ue).is_empty());
    Ok(())
}

#[async_std::test]
async fn cu_up_refuses_modification() -> anyhow::Result<()> {
    let t = init()?;
    let ue = t.attached_ue_with_sessions(&[1]).await?;
    let before = t.cucp.ue_up_context(ue).unwrap();

    // Given a CU-UP that refuses every modification
    t.cu_up.set_faults(CuUpFaults {
        modification_fails: true,
        ..Default::default()
    });

    let rsp = t
        .cucp
        .handle_pdu_session_resource_modify_request(modify_request(
            ue,
            1,
            vec![qos_flow(2, 5)],
            vec![],
        ))
        .await;

    // Then the session is reported failed and nothing changes
    assert!(rsp.pdu_sessions_modified.is_empty());
    assert_eq!(rsp.pdu_sessions_failed.len(), 1);
    assert_eq!(
        t.events.signaling_for(ue),
        vec![Event::E1BearerContextModification(ue)]
    );
    assert_eq!(t.cucp.ue_up_context(ue).unwrap(), before);
    Ok(())
}
