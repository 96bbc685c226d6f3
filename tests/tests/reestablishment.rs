use cucp::Rnti;
use cucp_tests::{DuFaults, Event, framework::*};
use xxap::{Cause, CauseRadioNetwork, DrbId, PduSessionId, SrbId};

#[async_std::test]
async fn reestablishment() -> anyhow::Result<()> {
    let t = init()?;

    // Given a UE with a PDU session that loses its radio link
    let old_ue = t.attached_ue_with_sessions(&[1]).await?;
    let old_rnti = t.last_rnti();

    // When it comes back as a new UE and asks to re-establish
    let new_ue = t.new_ue(t.du1_index, DU1_CELL_A).await?;
    assert!(
        t.cucp
            .handle_rrc_reestablishment(new_ue, DU1_CELL_A, old_rnti)
            .await
    );

    // Then the new UE takes over the AMF and CU-UP contexts and re-establishes its bearers
    assert_eq!(
        t.events.signaling_for(new_ue),
        vec![
            Event::RrcApplyTransferContext(new_ue),
            Event::E1BearerContextModification(new_ue),
            Event::F1UeContextModification(new_ue),
            Event::RrcReconfiguration(new_ue),
            Event::E1BearerContextModification(new_ue),
        ]
    );
    assert!(t.events.contains(&Event::NgUpdateUeIndex {
        new: new_ue,
        old: old_ue
    }));
    assert!(t.events.contains(&Event::E1UpdateUeIndex {
        new: new_ue,
        old: old_ue
    }));

    let e1_request = &t.cu_up.modifications()[0];
    assert!(e1_request.new_ul_tnl_information_required);
    assert!(e1_request.pdu_sessions_to_modify[0].drbs_to_modify[0].pdcp_reestablish);

    let f1_request = t.du1.last_ue_context_modification().unwrap();
    assert_eq!(f1_request.srbs_to_setup, vec![SrbId::SRB2]);
    assert_eq!(f1_request.drbs_to_setup[0].drb_id, DrbId(1));
    assert_eq!(
        f1_request.drbs_to_setup[0].ul_up_tnl_information,
        vec![t.cu_up.ul_tunnel(new_ue, DrbId(1))]
    );

    let (_, reconfiguration) = t.du1.last_reconfiguration().unwrap();
    let radio_bearer_config = reconfiguration.radio_bearer_config.unwrap();
    assert_eq!(radio_bearer_config.srbs_to_add, vec![SrbId::SRB2]);
    assert!(radio_bearer_config.drbs_to_add[0].reestablish_pdcp);

    let up = t.cucp.ue_up_context(new_ue).unwrap();
    assert!(up.is_consistent());
    let drb = &up.pdu_sessions[&PduSessionId(1)].drbs[&DrbId(1)];
    assert_eq!(drb.ul_up_tnl_information, vec![t.cu_up.ul_tunnel(new_ue, DrbId(1))]);
    assert_eq!(drb.dl_up_tnl_information, vec![t.du1.dl_tunnel(new_ue, DrbId(1))]);

    // And the old UE is released quietly, leaving the bearer context alone
    t.wait_until("old UE removed", |t| !t.ue_exists(old_ue))
        .await?;
    assert!(!t.events.contains(&Event::RrcRelease(old_ue)));
    assert!(!t.events.contains(&Event::E1BearerContextRelease(old_ue)));
    assert!(!t.events.contains(&Event::E1RemoveUe(old_ue)));
    assert_eq!(t.events.count(&Event::F1UeContextRelease(old_ue)), 1);
    assert_eq!(
        t.cucp.find_ue_by_pci_rnti(DU1_CELL_A, old_rnti),
        None
    );

    // The new UE answers for the sessions from now on
    let rsp = t
        .cucp
        .handle_pdu_session_resource_release_command(release_command(new_ue, &[1]))
        .await;
    assert_eq!(rsp.pdu_sessions_released, vec![PduSessionId(1)]);
    assert!(t.events.contains(&Event::E1BearerContextRelease(new_ue)));
    Ok(())
}

#[async_std::test]
async fn reestablishment_of_unknown_ue() -> anyhow::Result<()> {
    let t = init()?;
    let new_ue = t.new_ue(t.du1_index, DU1_CELL_A).await?;

    assert!(
        !t.cucp
            .handle_rrc_reestablishment(new_ue, DU1_CELL_A, Rnti(0x7777))
            .await
    );
    assert!(t.events.all().is_empty());
    assert!(t.ue_exists(new_ue));
    Ok(())
}

#[async_std::test]
async fn reestablishment_without_amf_context() -> anyhow::Result<()> {
    let t = init()?;

    // Given an old UE that never got past RRC setup
    let old_ue = t.new_ue(t.du1_index, DU1_CELL_A).await?;
    let old_rnti = t.last_rnti();
    let new_ue = t.new_ue(t.du1_index, DU1_CELL_A).await?;

    // Then the UE has to fall back to RRC setup
    assert!(
        !t.cucp
            .handle_rrc_reestablishment(new_ue, DU1_CELL_A, old_rnti)
            .await
    );
    assert!(t.events.all().is_empty());
    assert!(t.ue_exists(old_ue));
    Ok(())
}

#[async_std::test]
async fn reestablishment_rejected_by_ue() -> anyhow::Result<()> {
    let t = init()?;
    let old_ue = t.attached_ue_with_sessions(&[1]).await?;
    let old_rnti = t.last_rnti();
    let new_ue = t.new_ue(t.du1_index, DU1_CELL_A).await?;
    t.du1.set_faults(cucp_tests::DuFaults {
        reconfiguration_rejected: true,
        ..Default::default()
    });

    assert!(
        !t.cucp
            .handle_rrc_reestablishment(new_ue, DU1_CELL_A, old_rnti)
            .await
    );

    // The new UE, which by now owns the AMF context, asks the AMF to release it
    let request = t.amf.last_release_request().unwrap();
    assert_eq!(request.ue_index, new_ue);
    assert_eq!(
        request.cause,
        Cause::RadioNetwork(CauseRadioNetwork::FailureInRadioInterfaceProcedure)
    );
    t.wait_until("old UE removed", |t| !t.ue_exists(old_ue))
        .await?;
    Ok(())
}

#[async_std::test]
async fn reestablishment_waits_for_old_ue_procedure() -> anyhow::Result<()> {
    let t = init()?;

    // Given a UE whose first PDU session setup is stuck waiting for the DU
    let old_ue = t.attached_ue_with_sessions(&[]).await?;
    let old_rnti = t.last_rnti();
    t.du1.set_faults(DuFaults {
        modification_delay_ms: 300,
        ..Default::default()
    });
    let cucp = t.cucp.clone();
    let setup = async_std::task::spawn(async move {
        cucp.handle_pdu_session_resource_setup_request(setup_request(old_ue, vec![session(1, 9)]))
            .await
    });
    t.wait_until("old UE at DU", |t| {
        t.events.contains(&Event::F1UeContextModification(old_ue))
    })
    .await?;

    // When the UE re-establishes in the meantime
    let new_ue = t.new_ue(t.du1_index, DU1_CELL_A).await?;
    assert!(
        t.cucp
            .handle_rrc_reestablishment(new_ue, DU1_CELL_A, old_rnti)
            .await
    );

    // Then the setup finished on the old UE before the new UE took over its context
    let rsp = setup.await;
    assert_eq!(rsp.pdu_sessions_setup[0].pdu_session_id, PduSessionId(1));
    let events = t.events.all();
    let setup_done = events
        .iter()
        .position(|e| *e == Event::RrcReconfiguration(old_ue))
        .unwrap();
    let take_over = events
        .iter()
        .position(|e| *e == Event::RrcApplyTransferContext(new_ue))
        .unwrap();
    assert!(setup_done < take_over);

    // And the UE that now answers to the AMF has the session
    let up = t.cucp.ue_up_context(new_ue).unwrap();
    assert!(up.is_consistent());
    let drb = &up.pdu_sessions[&PduSessionId(1)].drbs[&DrbId(1)];
    assert_eq!(drb.ul_up_tnl_information, vec![t.cu_up.ul_tunnel(new_ue, DrbId(1))]);
    t.wait_until("old UE removed", |t| !t.ue_exists(old_ue))
        .await?;
    Ok(())
}
