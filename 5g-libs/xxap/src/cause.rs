//! cause - the cause values carried by unsuccessful outcomes and failed-item lists

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cause {
    RadioNetwork(CauseRadioNetwork),
    Transport(CauseTransport),
    Protocol(CauseProtocol),
    Misc(CauseMisc),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CauseRadioNetwork {
    Unspecified,
    NormalRelease,
    SuccessfulHandover,
    HandoverCancelled,
    UserInactivity,
    RadioConnectionWithUeLost,
    FailureInRadioInterfaceProcedure,
    MultiplePduSessionIdInstances,
    UnknownPduSessionId,
    UnknownQosFlowId,
    MultipleQosFlowIdInstances,
    RadioResourcesNotAvailable,
    NotSupported5qiValue,
    UnknownLocalUeId,
    ReleaseDueToNgranGeneratedReason,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CauseTransport {
    TransportResourceUnavailable,
    Unspecified,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CauseProtocol {
    SemanticError,
    MessageNotCompatibleWithReceiverState,
    Unspecified,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CauseMisc {
    NotEnoughUserPlaneProcessingResources,
    ControlProcessingOverload,
    HardwareFailure,
    OmIntervention,
    Unspecified,
}

impl Cause {
    pub fn is_normal_release(&self) -> bool {
        matches!(
            self,
            Cause::RadioNetwork(CauseRadioNetwork::NormalRelease)
                | Cause::RadioNetwork(CauseRadioNetwork::SuccessfulHandover)
        )
    }
}
