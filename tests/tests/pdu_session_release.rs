use cucp_tests::{Event, framework::*};
use xxap::{DrbId, PduSessionId};

#[async_std::test]
async fn release_one_of_two_sessions() -> anyhow::Result<()> {
    let t = init()?;

    // Given a UE with two PDU sessions
    let ue = t.attached_ue_with_sessions(&[1, 2]).await?;

    // When the AMF releases one of them
    let rsp = t
        .cucp
        .handle_pdu_session_resource_release_command(release_command(ue, &[1]))
        .await;

    // Then the CU-UP bearer context is modified rather than released
    assert_eq!(rsp.pdu_sessions_released, vec![PduSessionId(1)]);
    assert_eq!(
        t.events.signaling_for(ue),
        vec![
            Event::E1BearerContextModification(ue),
            Event::F1UeContextModification(ue),
            Event::RrcReconfiguration(ue),
        ]
    );
    let e1_request = t.cu_up.last_modification().unwrap();
    assert_eq!(e1_request.pdu_sessions_to_remove, vec![PduSessionId(1)]);
    let f1_request = t.du1.last_ue_context_modification().unwrap();
    assert_eq!(f1_request.drbs_to_release, vec![DrbId(1)]);
    let (_, reconfiguration) = t.du1.last_reconfiguration().unwrap();
    assert_eq!(
        reconfiguration.radio_bearer_config.unwrap().drbs_to_release,
        vec![DrbId(1)]
    );

    let up = t.cucp.ue_up_context(ue).unwrap();
    assert!(up.is_consistent());
    assert_eq!(up.pdu_sessions.keys().copied().collect::<Vec<_>>(), vec![PduSessionId(2)]);
    Ok(())
}

#[async_std::test]
async fn release_last_session() -> anyhow::Result<()> {
    let t = init()?;
    let ue = t.attached_ue_with_sessions(&[1]).await?;

    // When the AMF releases the only session
    let rsp = t
        .cucp
        .handle_pdu_session_resource_release_command(release_command(ue, &[1]))
        .await;

    // Then the whole bearer context at the CU-UP goes
    assert_eq!(rsp.pdu_sessions_released, vec![PduSessionId(1)]);
    assert_eq!(
        t.events.signaling_for(ue),
        vec![
            Event::E1BearerContextRelease(ue),
            Event::F1UeContextModification(ue),
            Event::RrcReconfiguration(ue),
        ]
    );
    assert!(t.cucp.ue_up_context(ue).unwrap().pdu_sessions.is_empty());

    // And the next session needs a fresh bearer context
    t.clear_history();
    let rsp = t
        .cucp
        .handle_pdu_session_resource_setup_request(setup_request(ue, vec![session(2, 9)]))
        .await;
    assert_eq!(rsp.pdu_sessions_setup.len(), 1);
    assert_eq!(
        t.events.signaling_for(ue).first(),
        Some(&Event::E1BearerContextSetup(ue))
    );
    Ok(())
}

#[async_std::test]
async fn release_unknown_session() -> anyhow::Result<()> {
    let t = init()?;
    let ue = t.attached_ue_with_sessions(&[1]).await?;

    let rsp = t
        .cucp
        .handle_pdu_session_resource_release_command(release_command(ue, &[5]))
        .await;

    // Already as good as released, so nobody needs to hear about it
    assert!(rsp.pdu_sessions_released.is_empty());
    assert!(t.events.signaling_for(ue).is_empty());
    assert_eq!(t.cucp.ue_up_context(ue).unwrap().pdu_sessions.len(), 1);
    Ok(())
}
