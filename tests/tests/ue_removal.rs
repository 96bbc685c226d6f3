use cucp::UeIndex;
use cucp_tests::{Event, framework::*};

#[async_std::test]
async fn remove_ue_before_attach() -> anyhow::Result<()> {
    let t = init()?;

    // Given a UE that never got as far as initial context setup
    let ue = t.new_ue(t.du1_index, DU1_CELL_A).await?;
    let rnti = t.last_rnti();
    assert_eq!(t.cucp.find_ue_by_pci_rnti(DU1_CELL_A, rnti), Some(ue));

    // When it is removed
    assert!(t.cucp.handle_ue_removal_request(ue).await);

    // Then nothing is signaled, and each collaborator drops its state
    assert!(t.events.signaling_for(ue).is_empty());
    assert_eq!(
        t.events.all(),
        vec![
            Event::RrcRemoveUe(ue),
            Event::F1RemoveUe(ue),
            Event::NgRemoveUe(ue),
        ]
    );
    assert!(!t.ue_exists(ue));
    assert_eq!(t.cucp.find_ue_by_pci_rnti(DU1_CELL_A, rnti), None);
    assert_eq!(t.cucp.nof_ues(), 0);
    Ok(())
}

#[async_std::test]
async fn remove_ue_with_bearer_context() -> anyhow::Result<()> {
    let t = init()?;
    let ue = t.attached_ue_with_sessions(&[1]).await?;

    assert!(t.cucp.handle_ue_removal_request(ue).await);

    assert_eq!(
        t.events.all(),
        vec![
            Event::RrcRemoveUe(ue),
            Event::E1RemoveUe(ue),
            Event::F1RemoveUe(ue),
            Event::NgRemoveUe(ue),
        ]
    );
    assert!(!t.ue_exists(ue));
    Ok(())
}

#[async_std::test]
async fn remove_unknown_ue() -> anyhow::Result<()> {
    let t = init()?;
    assert!(!t.cucp.handle_ue_removal_request(UeIndex(9)).await);

    // Removing twice is harmless
    let ue = t.new_ue(t.du2_index, DU2_CELL).await?;
    assert!(t.cucp.handle_ue_removal_request(ue).await);
    assert!(!t.cucp.handle_ue_removal_request(ue).await);
    assert_eq!(t.events.count(&Event::F1RemoveUe(ue)), 1);
    Ok(())
}

#[async_std::test]
async fn ue_index_is_reused_after_removal() -> anyhow::Result<()> {
    let t = init()?;
    let ue = t.new_ue(t.du1_index, DU1_CELL_A).await?;
    assert!(t.cucp.handle_ue_removal_request(ue).await);

    // The freed index is available again
    let next = t.new_ue(t.du1_index, DU1_CELL_B).await?;
    assert!(t.ue_exists(next));
    assert_eq!(t.cucp.nof_ues(), 1);
    Ok(())
}
