use cucp::protocols::ngap::UeContextReleaseCommand;
use cucp_tests::{Event, framework::*};
use xxap::{Cause, CauseMisc, CauseRadioNetwork, CauseTransport};

#[async_std::test]
async fn e1_link_loss() -> anyhow::Result<()> {
    let t = init()?;

    // Given a UE with a bearer context at the CU-UP
    let ue = t.attached_ue_with_sessions(&[1]).await?;

    // When the E1 link drops
    assert!(t.cucp.handle_e1_link_loss(t.cu_up_index).await);

    // Then the AMF is asked to release the UE
    t.wait_until("release request", |t| {
        t.events.contains(&Event::NgUeContextReleaseRequest(ue))
    })
    .await?;
    assert_eq!(
        t.amf.last_release_request().unwrap().cause,
        Cause::Transport(CauseTransport::TransportResourceUnavailable)
    );
    assert_eq!(t.cucp.nof_cu_ups(), 0);

    // And when it does, there is no bearer context left to release
    t.cucp
        .handle_ue_context_release_command(UeContextReleaseCommand {
            ue_index: ue,
            cause: Cause::RadioNetwork(CauseRadioNetwork::NormalRelease),
        })
        .await;
    assert_eq!(
        t.events.signaling_for(ue),
        vec![
            Event::NgUeContextReleaseRequest(ue),
            Event::RrcRelease(ue),
            Event::F1UeContextRelease(ue),
        ]
    );
    assert!(!t.events.contains(&Event::E1RemoveUe(ue)));
    assert!(!t.ue_exists(ue));
    Ok(())
}

#[async_std::test]
async fn no_cu_up_for_new_sessions() -> anyhow::Result<()> {
    let t = init()?;
    assert!(t.cucp.handle_e1_link_loss(t.cu_up_index).await);
    let ue = t.attached_ue_with_sessions(&[]).await?;

    let rsp = t
        .cucp
        .handle_pdu_session_resource_setup_request(setup_request(ue, vec![session(1, 9)]))
        .await;

    assert!(rsp.pdu_sessions_setup.is_empty());
    assert_eq!(
        rsp.pdu_sessions_failed[0].cause,
        Cause::Misc(CauseMisc::NotEnoughUserPlaneProcessingResources)
    );
    assert!(t.events.signaling_for(ue).is_empty());
    Ok(())
}

#[async_std::test]
async fn amf_connection_loss() -> anyhow::Result<()> {
    let t = init()?;

    // Given one UE with a session and one that is still attaching
    let attached = t.attached_ue_with_sessions(&[1]).await?;
    let attaching = t.new_ue(t.du2_index, DU2_CELL).await?;

    // When the AMF goes away
    assert!(t.cucp.handle_amf_connection_loss().await);

    // Then both are released locally, without asking the AMF
    t.wait_until("all UEs removed", |t| t.cucp.nof_ues() == 0)
        .await?;
    assert_eq!(
        t.events.signaling_for(attached),
        vec![
            Event::E1BearerContextRelease(attached),
            Event::RrcRelease(attached),
            Event::F1UeContextRelease(attached),
        ]
    );
    assert_eq!(
        t.events.signaling_for(attaching),
        vec![
            Event::RrcRelease(attaching),
            Event::F1UeContextRelease(attaching),
        ]
    );
    assert!(t.amf.last_release_request().is_none());
    Ok(())
}

#[async_std::test]
async fn f1_link_loss() -> anyhow::Result<()> {
    let t = init()?;

    // Given a UE on each DU
    let lost = t.attached_ue_with_sessions(&[1]).await?;
    let unaffected = t.new_ue(t.du2_index, DU2_CELL).await?;
    t.attach(unaffected).await?;
    t.clear_history();

    // When the link to DU 1 drops
    assert!(t.cucp.handle_f1_link_loss(t.du1_index).await);

    // Then the AMF is asked to release the UE on DU 1 only
    t.wait_until("release request", |t| {
        t.events.contains(&Event::NgUeContextReleaseRequest(lost))
    })
    .await?;
    let request = t.amf.last_release_request().unwrap();
    assert_eq!(request.ue_index, lost);
    assert_eq!(
        request.cause,
        Cause::RadioNetwork(CauseRadioNetwork::RadioConnectionWithUeLost)
    );
    assert!(t.events.signaling_for(unaffected).is_empty());
    assert!(t.ue_exists(unaffected));

    // And DU 1 can no longer take UEs
    assert_eq!(t.cucp.nof_dus(), 1);
    assert!(t.new_ue(t.du1_index, DU1_CELL_A).await.is_err());
    assert!(t.new_ue(t.du2_index, DU2_CELL).await.is_ok());
    Ok(())
}
