//! The reconciliation engine.
//!
//! Walks the inventory device by device, interface by interface and
//! address by address.  Each address is validated, compared against the
//! device's current state and, when they differ, turned into a create or
//! update that has to pass the approval gate before the device is touched.
//! Every address handled produces exactly one [`ReconciliationOutcome`].

use std::net::Ipv4Addr;
use std::sync::Arc;

use log::{error, info, warn};

use crate::approval::{Approval, ApprovalGate, ApprovalRequest};
use crate::config::{DeviceConfig, ReconcilePolicy};
use crate::device::{DeviceClient, DeviceMutator, DeviceStateReader};
use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::netmask::prefix_length_to_mask;
use crate::types::{
    DesiredInterface, InventoryAddress, InventoryDevice, InventoryInterface, MutationAction,
    ObservedInterface, OutcomeKind, ReconciliationOutcome, NOT_DEFINED_ON_DEVICE,
    NO_ADDRESS_ON_DEVICE,
};
use crate::validate::{RuleField, Validator};

/// Receives outcomes as each interface completes.
pub trait OutcomeSink {
    fn record(&mut self, outcomes: &[ReconciliationOutcome]) -> Result<()>;
}

impl OutcomeSink for Vec<ReconciliationOutcome> {
    fn record(&mut self, outcomes: &[ReconciliationOutcome]) -> Result<()> {
        self.extend_from_slice(outcomes);
        Ok(())
    }
}

/// Totals for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub devices: usize,
    pub in_sync: usize,
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
    pub invalid: usize,
    /// The operator closed the approval prompt.
    pub cancelled: bool,
}

impl RunSummary {
    fn count(&mut self, outcome: &ReconciliationOutcome) {
        match outcome.kind {
            OutcomeKind::InvalidHostname | OutcomeKind::InvalidAddress(_) => self.invalid += 1,
            OutcomeKind::InSync => self.in_sync += 1,
            OutcomeKind::Applied(_) => self.applied += 1,
            OutcomeKind::Failed { .. } => self.failed += 1,
            OutcomeKind::Skipped(_) => self.skipped += 1,
            OutcomeKind::Cancelled(_) => self.cancelled = true,
        }
    }
}

/// What to do after an address has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    EndInterface,
    EndRun,
}

pub struct Reconciler {
    validator: Validator,
    reader: DeviceStateReader,
    mutator: DeviceMutator,
    gate: Box<dyn ApprovalGate>,
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(
        validator: Validator,
        client: Arc<dyn DeviceClient>,
        gate: Box<dyn ApprovalGate>,
    ) -> Self {
        let description = DeviceConfig::default().interface_description;
        Self {
            validator,
            reader: DeviceStateReader::new(client.clone()),
            mutator: DeviceMutator::new(client, description),
            gate,
            policy: ReconcilePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses `mutator` for device changes, e.g. one writing a configured
    /// interface description.
    pub fn with_mutator(mut self, mutator: DeviceMutator) -> Self {
        self.mutator = mutator;
        self
    }

    /// Reconciles every device the inventory lists, in inventory order.
    ///
    /// Inventory and sink failures abort the run; everything that goes
    /// wrong on the device side is recorded as an outcome instead.
    pub async fn run(
        &mut self,
        inventory: &dyn Inventory,
        sink: &mut dyn OutcomeSink,
    ) -> Result<RunSummary> {
        let devices = inventory.list_devices().await?;
        info!("Inventory lists {} devices", devices.len());

        let mut summary = RunSummary::default();
        'devices: for device in &devices {
            summary.devices += 1;
            info!("Device: {} ({}), role {}", device.name, device.device_type, device.role);

            if !self
                .validator
                .validate(&device.role, RuleField::Hostname, &device.name)
            {
                warn!(
                    "Device name {} does not conform to the format for role {}",
                    device.name, device.role
                );
                let outcome = ReconciliationOutcome::invalid_hostname(device);
                summary.count(&outcome);
                sink.record(std::slice::from_ref(&outcome))?;
                if self.policy.abort_device_on_invalid_hostname {
                    continue;
                }
            }

            let interfaces = inventory.list_interfaces(&device.id).await?;
            for interface in &interfaces {
                let addresses = inventory.list_ip_addresses(&interface.id).await?;
                let (outcomes, flow) = self
                    .reconcile_interface(device, interface, &addresses)
                    .await?;

                for outcome in &outcomes {
                    summary.count(outcome);
                }
                sink.record(&outcomes)?;

                if flow == Flow::EndRun {
                    warn!("Run cancelled at {} {}", device.name, interface.name);
                    break 'devices;
                }
            }
        }

        Ok(summary)
    }

    async fn reconcile_interface(
        &mut self,
        device: &InventoryDevice,
        interface: &InventoryInterface,
        addresses: &[InventoryAddress],
    ) -> Result<(Vec<ReconciliationOutcome>, Flow)> {
        info!("Interface: {} ({})", interface.name, interface.kind);

        let mut outcomes = Vec::with_capacity(addresses.len());
        for entry in addresses {
            let desired = match self.desired_from(device, interface, entry) {
                Ok(desired) => desired,
                Err(reason) => {
                    warn!("IP address on inventory: {} ({})", entry.address, reason);
                    outcomes.push(ReconciliationOutcome {
                        device: device.name.clone(),
                        role: device.role.clone(),
                        interface: interface.name.clone(),
                        interface_type: interface.kind.clone(),
                        desired_cidr: entry.address.clone(),
                        observed: String::new(),
                        kind: OutcomeKind::InvalidAddress(reason),
                    });
                    continue;
                }
            };
            info!("IP address on inventory: {}", desired.cidr());

            match self.reconcile(&desired).await {
                Ok((outcome, flow)) => {
                    outcomes.push(outcome);
                    match flow {
                        Flow::Continue => {}
                        Flow::EndInterface => break,
                        Flow::EndRun => return Ok((outcomes, Flow::EndRun)),
                    }
                }
                Err(Error::DeviceUnreachable(reason)) => {
                    error!("Cannot read {} from device: {}", desired.interface_name, reason);
                    outcomes.push(outcome_for(
                        &desired,
                        String::new(),
                        OutcomeKind::Failed {
                            action: None,
                            reason,
                        },
                    ));
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((outcomes, Flow::Continue))
    }

    /// Validates and parses one inventory address.  The error is the reason
    /// recorded in the report.
    fn desired_from(
        &self,
        device: &InventoryDevice,
        interface: &InventoryInterface,
        entry: &InventoryAddress,
    ) -> std::result::Result<DesiredInterface, String> {
        let (ip, prefix) = match entry.address.split_once('/') {
            Some((ip, prefix)) => (ip, Some(prefix)),
            None => (entry.address.as_str(), None),
        };

        if !self
            .validator
            .validate(&device.role, RuleField::IpAddress, ip)
        {
            return Err(format!("rejected by ip_address rule for role {}", device.role));
        }

        let address: Ipv4Addr = ip
            .parse()
            .map_err(|_| format!("{} is not an IPv4 address", ip))?;
        let prefix_length = prefix
            .and_then(|p| p.parse::<u8>().ok())
            .filter(|p| *p <= 32)
            .ok_or_else(|| format!("{} has no valid prefix length", entry.address))?;

        Ok(DesiredInterface {
            device_name: device.name.clone(),
            device_role: device.role.clone(),
            interface_name: interface.name.clone(),
            interface_type: interface.kind.clone(),
            desired_address: address,
            desired_prefix_length: prefix_length,
        })
    }

    /// Compares one desired address with the device and acts on the
    /// difference.  Only failures reading the device are returned as errors.
    async fn reconcile(
        &mut self,
        desired: &DesiredInterface,
    ) -> Result<(ReconciliationOutcome, Flow)> {
        let observed = self.reader.find_interface(&desired.interface_name).await?;

        let (action, observed_text) = match observed.filter(|o| !o.is_undefined()) {
            None => {
                info!("IP address on device: {}", NOT_DEFINED_ON_DEVICE);
                (MutationAction::Create, NOT_DEFINED_ON_DEVICE.to_string())
            }
            Some(observed) => {
                let text = observed
                    .address
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| NO_ADDRESS_ON_DEVICE.to_string());
                info!("IP address on device: {}", text);

                if self.in_sync(desired, &observed)? {
                    info!("IP addresses are same");
                    return Ok((outcome_for(desired, text, OutcomeKind::InSync), Flow::Continue));
                }
                info!("IP address difference detected");
                (MutationAction::Update, text)
            }
        };

        let request = ApprovalRequest {
            desired,
            action,
            observed: &observed_text,
        };
        let (kind, flow) = match self.gate.approve(&request).await? {
            Approval::Confirmed => {
                let kind = self.mutate(desired, action).await?;
                let flow = if self.gate.is_automatic()
                    && self.policy.force_mode_processes_only_first_pending_change
                {
                    Flow::EndInterface
                } else {
                    Flow::Continue
                };
                (kind, flow)
            }
            Approval::Declined => {
                info!("Change not confirmed, skipped");
                (OutcomeKind::Skipped(action), Flow::Continue)
            }
            Approval::Cancelled => (OutcomeKind::Cancelled(action), Flow::EndRun),
        };

        Ok((outcome_for(desired, observed_text, kind), flow))
    }

    fn in_sync(&self, desired: &DesiredInterface, observed: &ObservedInterface) -> Result<bool> {
        if observed.address != Some(desired.desired_address) {
            return Ok(false);
        }
        if !self.policy.compare_prefix_length {
            return Ok(true);
        }
        let mask = prefix_length_to_mask(desired.desired_prefix_length.into())?;
        Ok(observed.netmask.as_deref() == Some(mask.as_str()))
    }

    async fn mutate(
        &self,
        desired: &DesiredInterface,
        action: MutationAction,
    ) -> Result<OutcomeKind> {
        let prefix = if self.policy.use_desired_prefix_length {
            desired.desired_prefix_length
        } else {
            self.policy.mutation_prefix_length
        };
        let mask = prefix_length_to_mask(prefix.into())?;

        let kind = match self
            .mutator
            .apply(&desired.interface_name, desired.desired_address, &mask, action)
            .await
        {
            Ok(()) => OutcomeKind::Applied(action),
            Err(e) => {
                error!("{}", e);
                OutcomeKind::Failed {
                    action: Some(action),
                    reason: e.to_string(),
                }
            }
        };
        Ok(kind)
    }
}

fn outcome_for(
    desired: &DesiredInterface,
    observed: String,
    kind: OutcomeKind,
) -> ReconciliationOutcome {
    ReconciliationOutcome {
        device: desired.device_name.clone(),
        role: desired.device_role.clone(),
        interface: desired.interface_name.clone(),
        interface_type: desired.interface_type.clone(),
        desired_cidr: desired.cidr(),
        observed,
        kind,
    }
}
