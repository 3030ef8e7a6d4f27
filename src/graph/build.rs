//! Graph builder: launch descriptor + registry snapshot -> cross-linked graph.
//!
//! Three phases:
//! 1) Process inventory from the descriptor, resolved against the live
//!    registry. A duplicate declaration is fatal; a process the registry
//!    cannot find is skipped with a warning.
//! 2) Services from the provided list, with types looked up one by one.
//! 3) Channels from the type listing (authoritative). Any channel named in
//!    the publish/subscribe state but absent from that listing is fatal.
//!
//! All state is local until `build` returns, so a failure leaves nothing
//! behind for the caller.

use crate::error::{ChannelRole, GraphError};
use crate::graph::model::{BuildWarning, Channel, ChannelMap, Graph, Process, ProcessMap, Service, ServiceMap};
use crate::graph::policy::{BuildPolicy, DuplicatePolicy};
use crate::launch::LaunchDescriptor;
use crate::registry::{Owners, Registry, Snapshot};

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

pub struct GraphBuilder<'r, R: Registry + ?Sized> {
    registry: &'r R,
    policy: BuildPolicy,
}

/// Outcome of resolving one declared process.
enum Resolution {
    Live { uri: String, runtime_id: String },
    Missing(String),
}

impl<'r, R: Registry + ?Sized> GraphBuilder<'r, R> {
    pub fn new(registry: &'r R, policy: BuildPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn build(&self, launch: &LaunchDescriptor, snapshot: &Snapshot) -> Result<Graph, GraphError> {
        let mut warnings = Vec::new();

        let mut processes = self.inventory(launch, &mut warnings)?;
        let services = self.services(&snapshot.state.provided, &mut processes, &mut warnings)?;

        // Later duplicates in the type listing do not override the first.
        let mut channels = ChannelMap::new();
        for (name, payload_type) in &snapshot.channel_types {
            channels
                .entry(name.clone())
                .or_insert_with(|| Channel::new(name.clone(), payload_type.clone()));
        }
        link_channels(&mut channels, &mut processes, &snapshot.state.published, ChannelRole::Publishers)?;
        link_channels(&mut channels, &mut processes, &snapshot.state.subscribed, ChannelRole::Subscribers)?;

        info!(
            processes = processes.len(),
            channels = channels.len(),
            services = services.len(),
            warnings = warnings.len(),
            "graph built"
        );

        Ok(Graph {
            processes,
            channels,
            services,
            warnings,
        })
    }

    fn inventory(
        &self,
        launch: &LaunchDescriptor,
        warnings: &mut Vec<BuildWarning>,
    ) -> Result<ProcessMap, GraphError> {
        let mut processes = ProcessMap::new();
        // Declared names, including ones skipped as not live.
        let mut declared = BTreeSet::new();

        for decl in &launch.nodes {
            let name = decl.qualified_name();

            if !declared.insert(name.clone()) {
                match self.policy.on_duplicate {
                    DuplicatePolicy::Reject => return Err(GraphError::DuplicateProcess { name }),
                    DuplicatePolicy::KeepFirst => {
                        warn!(process = %name, "duplicate declaration ignored");
                        warnings.push(BuildWarning::DuplicateProcess { name });
                        continue;
                    }
                }
            }

            match self.resolve(&name)? {
                Resolution::Live { uri, runtime_id } => {
                    debug!(process = %name, %uri, %runtime_id, "process resolved");
                    processes.insert(
                        name.clone(),
                        Process::new(name, decl.declared_type(), uri, runtime_id),
                    );
                }
                Resolution::Missing(reason) => {
                    warn!(process = %name, %reason, "process not live, skipping");
                    warnings.push(BuildWarning::ProcessResolution { name, reason });
                }
            }
        }

        Ok(processes)
    }

    /// Look a process up by name, then ask it for its runtime id.
    ///
    /// Only a registry-level failure of the name lookup is fatal; a failure
    /// of the runtime-id call concerns the process alone.
    fn resolve(&self, name: &str) -> Result<Resolution, GraphError> {
        let uri = match self.registry.resolve_process(name) {
            Ok(uri) => uri,
            Err(e) if e.is_recoverable() => return Ok(Resolution::Missing(e.to_string())),
            Err(e) => return Err(e.into()),
        };
        match self.registry.get_runtime_id(&uri) {
            Ok(runtime_id) => Ok(Resolution::Live { uri, runtime_id }),
            Err(e) => Ok(Resolution::Missing(e.to_string())),
        }
    }

    fn services(
        &self,
        provided: &Owners,
        processes: &mut ProcessMap,
        warnings: &mut Vec<BuildWarning>,
    ) -> Result<ServiceMap, GraphError> {
        let mut services = ServiceMap::new();

        for (service_name, providers) in provided {
            if !services.contains_key(service_name) {
                let rr_type = match self.registry.resolve_type(service_name) {
                    Ok(t) => t,
                    Err(e) if e.is_recoverable() => {
                        warn!(service = %service_name, error = %e, "service type unresolved");
                        warnings.push(BuildWarning::ServiceType {
                            service: service_name.clone(),
                            reason: e.to_string(),
                        });
                        String::new()
                    }
                    Err(e) => return Err(e.into()),
                };
                services.insert(service_name.clone(), Service::new(service_name.clone(), rr_type));
            }

            let Some(service) = services.get_mut(service_name) else {
                continue;
            };
            for provider in providers {
                service.providers.insert(provider.clone());
                // Providers outside the inventory stay listed, unlinked.
                if let Some(p) = processes.get_mut(provider) {
                    p.provided_services.insert(service_name.clone());
                }
            }
        }

        Ok(services)
    }
}

fn link_channels(
    channels: &mut ChannelMap,
    processes: &mut ProcessMap,
    owners: &Owners,
    role: ChannelRole,
) -> Result<(), GraphError> {
    for (channel_name, names) in owners {
        let channel = channels
            .get_mut(channel_name)
            .ok_or_else(|| GraphError::InconsistentChannel {
                channel: channel_name.clone(),
                role,
            })?;

        for n in names {
            let process = processes.get_mut(n);
            match role {
                ChannelRole::Publishers => {
                    channel.publishers.insert(n.clone());
                    if let Some(p) = process {
                        p.published_channels.insert(channel_name.clone());
                    }
                }
                ChannelRole::Subscribers => {
                    channel.subscribers.insert(n.clone());
                    if let Some(p) = process {
                        p.subscribed_channels.insert(channel_name.clone());
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityKind;
    use crate::launch::NodeDecl;
    use crate::features::{FeatureMap, derive_features, process_tags};
    use crate::graph::policy::DanglingPolicy;
    use crate::registry::{RegistryError, StaticRegistry};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn launch(nodes: &[(&str, &str, &str)]) -> LaunchDescriptor {
        LaunchDescriptor::new(
            nodes
                .iter()
                .map(|(name, pkg, kind)| NodeDecl::new(*name, *pkg, *kind))
                .collect(),
        )
    }

    fn build(reg: &StaticRegistry, desc: &LaunchDescriptor) -> Result<Graph, GraphError> {
        build_with(reg, desc, BuildPolicy::default())
    }

    fn build_with(
        reg: &StaticRegistry,
        desc: &LaunchDescriptor,
        policy: BuildPolicy,
    ) -> Result<Graph, GraphError> {
        let snapshot = Snapshot::capture(reg)?;
        GraphBuilder::new(reg, policy).build(desc, &snapshot)
    }

    #[test]
    fn test_pub_sub_scenario() {
        let reg = StaticRegistry::new()
            .process("/A")
            .process("/B")
            .channel("/t", "T")
            .publish("/t", &["/A"])
            .subscribe("/t", &["/B"]);
        let desc = launch(&[("A", "foo", "bar"), ("B", "foo", "baz")]);

        let graph = build(&reg, &desc).unwrap();

        assert_eq!(graph.processes["/A"].published_channels, set(&["/t"]));
        assert_eq!(graph.processes["/B"].subscribed_channels, set(&["/t"]));
        assert_eq!(graph.channels["/t"].publishers, set(&["/A"]));
        assert_eq!(graph.channels["/t"].subscribers, set(&["/B"]));
        assert_eq!(graph.processes["/A"].declared_type, "foo/bar");
        assert!(graph.warnings.is_empty());
        assert!(graph.consistency_violations().is_empty());
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let reg = StaticRegistry::new().process("/A");
        let desc = launch(&[("A", "foo", "bar"), ("A", "foo", "baz")]);

        let err = build(&reg, &desc).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateProcess { ref name } if name == "/A"));
    }

    #[test]
    fn test_duplicate_rejected_even_when_first_not_live() {
        let reg = StaticRegistry::new();
        let desc = launch(&[("A", "foo", "bar"), ("A", "foo", "bar")]);

        let err = build(&reg, &desc).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateProcess { .. }));
    }

    #[test]
    fn test_duplicate_keep_first_policy() {
        let reg = StaticRegistry::new().process("/A");
        let desc = launch(&[("A", "foo", "bar"), ("A", "foo", "baz")]);
        let policy = BuildPolicy {
            on_duplicate: DuplicatePolicy::KeepFirst,
            ..BuildPolicy::default()
        };

        let graph = build_with(&reg, &desc, policy).unwrap();
        assert_eq!(graph.processes["/A"].declared_type, "foo/bar");
        assert_eq!(
            graph.warnings,
            vec![BuildWarning::DuplicateProcess { name: "/A".into() }]
        );
    }

    #[test]
    fn test_missing_process_skipped() {
        let reg = StaticRegistry::new()
            .process("/A")
            .channel("/t", "T")
            .publish("/t", &["/A"])
            .subscribe("/t", &["/B"]);
        let desc = launch(&[("A", "foo", "bar"), ("B", "foo", "baz")]);

        let graph = build(&reg, &desc).unwrap();

        assert!(graph.processes.contains_key("/A"));
        assert!(!graph.processes.contains_key("/B"));
        // The registry still reports /B as a subscriber; it stays unlinked.
        assert_eq!(graph.channels["/t"].subscribers, set(&["/B"]));
        assert_eq!(graph.processes["/A"].published_channels, set(&["/t"]));
        assert!(matches!(
            graph.warnings.as_slice(),
            [BuildWarning::ProcessResolution { name, .. }] if name == "/B"
        ));
        assert!(graph.consistency_violations().is_empty());
    }

    #[test]
    fn test_dead_runtime_endpoint_skipped() {
        let reg = StaticRegistry::new().process("/A").process_without_runtime("/B");
        let desc = launch(&[("A", "foo", "bar"), ("B", "foo", "baz")]);

        let graph = build(&reg, &desc).unwrap();
        assert_eq!(graph.processes.keys().collect::<Vec<_>>(), vec!["/A"]);
        assert_eq!(graph.warnings.len(), 1);
    }

    #[test]
    fn test_inconsistent_published_channel_is_fatal() {
        let reg = StaticRegistry::new()
            .process("/A")
            .publish("/ghost", &["/A"]);
        let desc = launch(&[("A", "foo", "bar")]);

        let err = build(&reg, &desc).unwrap_err();
        match err {
            GraphError::InconsistentChannel { channel, role } => {
                assert_eq!(channel, "/ghost");
                assert_eq!(role, ChannelRole::Publishers);
            }
            other => panic!("expected InconsistentChannel, got {:?}", other),
        }
    }

    #[test]
    fn test_inconsistent_subscribed_channel_is_fatal() {
        let reg = StaticRegistry::new()
            .process("/A")
            .channel("/t", "T")
            .publish("/t", &["/A"])
            .subscribe("/ghost", &["/A"]);
        let desc = launch(&[("A", "foo", "bar")]);

        let err = build(&reg, &desc).unwrap_err();
        assert!(matches!(
            err,
            GraphError::InconsistentChannel { role: ChannelRole::Subscribers, .. }
        ));
    }

    #[test]
    fn test_services_cross_linked() {
        let reg = StaticRegistry::new()
            .process("/A")
            .provide("/add", "pkg/AddTwoInts", &["/A", "/rosout"]);
        let desc = launch(&[("A", "foo", "bar")]);

        let graph = build(&reg, &desc).unwrap();
        let svc = &graph.services["/add"];
        assert_eq!(svc.request_response_type, "pkg/AddTwoInts");
        assert_eq!(svc.providers, set(&["/A", "/rosout"]));
        assert_eq!(graph.processes["/A"].provided_services, set(&["/add"]));
        assert!(graph.consistency_violations().is_empty());
    }

    #[test]
    fn test_unresolved_service_type_recorded() {
        let mut reg = StaticRegistry::new()
            .process("/A")
            .provide("/add", "pkg/AddTwoInts", &["/A"]);
        reg.service_types.clear();
        let desc = launch(&[("A", "foo", "bar")]);

        let graph = build(&reg, &desc).unwrap();
        assert_eq!(graph.services["/add"].request_response_type, "");
        assert!(matches!(
            graph.warnings.as_slice(),
            [BuildWarning::ServiceType { service, .. }] if service == "/add"
        ));
    }

    #[test]
    fn test_repeated_service_entry_merges_providers() {
        let reg = StaticRegistry::new()
            .process("/A")
            .process("/B")
            .provide("/s", "pkg/S", &["/A"])
            .provide("/s", "pkg/S", &["/B"]);
        let desc = launch(&[("A", "foo", "bar"), ("B", "foo", "bar")]);

        let graph = build(&reg, &desc).unwrap();
        assert_eq!(graph.services.len(), 1);
        assert_eq!(graph.services["/s"].providers, set(&["/A", "/B"]));
    }

    #[test]
    fn test_unreachable_registry_during_lookup_is_fatal() {
        let reg = StaticRegistry::new().process("/A");
        let snapshot = Snapshot::capture(&reg).unwrap();
        let down = reg.clone().unreachable();
        let desc = launch(&[("A", "foo", "bar")]);

        let err = GraphBuilder::new(&down, BuildPolicy::default())
            .build(&desc, &snapshot)
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::Communication(RegistryError::Unreachable { .. })
        ));
    }

    #[test]
    fn test_channel_without_traffic_still_built() {
        let reg = StaticRegistry::new().process("/A").channel("/idle", "std_msgs/Empty");
        let desc = launch(&[("A", "foo", "bar")]);

        let graph = build(&reg, &desc).unwrap();
        assert!(graph.channels["/idle"].publishers.is_empty());
        assert!(graph.processes["/A"].published_channels.is_empty());
    }

    #[test]
    fn test_error_display_names_entity() {
        let err = GraphError::DanglingReference {
            process: "/A".into(),
            kind: EntityKind::Channel,
            name: "/t".into(),
        };
        assert_eq!(err.to_string(), "process '/A' references unknown channel '/t'");
    }

    const DECLARABLE: [(&str, &str); 5] = [("/", "a"), ("/", "b"), ("/ns", "a"), ("/ns", "b"), ("/ns", "c")];
    // Qualified forms of DECLARABLE, then one owner that is never declared.
    const OWNERS: [&str; 6] = ["/a", "/b", "/ns/a", "/ns/b", "/ns/c", "/rosout"];
    const KINDS: [&str; 3] = ["talker", "listener", "relay"];
    const CHANNELS: [(&str, &str); 4] = [("/c0", "T0"), ("/c1", "T1"), ("/c2", "T0"), ("/c3", "")];
    const SERVICES: [&str; 3] = ["/s0", "/s1", "/s2"];

    #[derive(Debug, Clone)]
    struct RandomGraph {
        decls: Vec<(usize, usize)>,
        live: Vec<bool>,
        published: Vec<Vec<usize>>,
        subscribed: Vec<Vec<usize>>,
        provided: Vec<Vec<usize>>,
        typed_services: Vec<bool>,
    }

    fn arb_graph() -> impl Strategy<Value = RandomGraph> {
        let owner_lists = |n: usize| prop::collection::vec(prop::collection::vec(0..OWNERS.len(), 0..4), n);
        (
            prop::collection::vec((0..DECLARABLE.len(), 0..KINDS.len()), 1..8),
            prop::collection::vec(any::<bool>(), OWNERS.len()),
            owner_lists(CHANNELS.len()),
            owner_lists(CHANNELS.len()),
            owner_lists(SERVICES.len()),
            prop::collection::vec(any::<bool>(), SERVICES.len()),
        )
            .prop_map(|(decls, live, published, subscribed, provided, typed_services)| RandomGraph {
                decls,
                live,
                published,
                subscribed,
                provided,
                typed_services,
            })
    }

    fn owner_names(idx: &[usize]) -> Vec<&'static str> {
        idx.iter().map(|&i| OWNERS[i]).collect()
    }

    impl RandomGraph {
        fn registry(&self) -> StaticRegistry {
            let mut reg = StaticRegistry::new();
            for (i, owner) in OWNERS.iter().enumerate() {
                if self.live[i] {
                    reg = reg.process(owner);
                }
            }
            for (c, (name, ty)) in CHANNELS.iter().enumerate() {
                reg = reg
                    .channel(name, ty)
                    .publish(name, &owner_names(&self.published[c]))
                    .subscribe(name, &owner_names(&self.subscribed[c]));
            }
            for (s, name) in SERVICES.iter().enumerate() {
                if self.provided[s].is_empty() {
                    continue;
                }
                reg = reg.provide(name, "pkg/Srv", &owner_names(&self.provided[s]));
                if !self.typed_services[s] {
                    reg.service_types.remove(*name);
                }
            }
            reg
        }

        fn descriptor(&self) -> LaunchDescriptor {
            LaunchDescriptor::new(
                self.decls
                    .iter()
                    .map(|&(d, k)| {
                        let (ns, name) = DECLARABLE[d];
                        NodeDecl::new(name, "pkg", KINDS[k]).in_namespace(ns)
                    })
                    .collect(),
            )
        }

        /// Names of declared processes the registry knows as live.
        fn resolvable(&self) -> BTreeSet<String> {
            self.decls
                .iter()
                .filter(|&&(d, _)| self.live[d])
                .map(|&(d, _)| OWNERS[d].to_string())
                .collect()
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        #[test]
        fn test_built_graphs_are_symmetric_and_unioned_by_type(g in arb_graph()) {
            let reg = g.registry();
            let policy = BuildPolicy {
                on_duplicate: DuplicatePolicy::KeepFirst,
                ..BuildPolicy::default()
            };
            let graph = build_with(&reg, &g.descriptor(), policy).unwrap();

            let violations = graph.consistency_violations();
            prop_assert!(violations.is_empty(), "violations: {:?}", violations);
            prop_assert_eq!(graph.processes.keys().cloned().collect::<BTreeSet<_>>(), g.resolvable());

            let features = derive_features(&graph, DanglingPolicy::Fail).unwrap();
            let types: BTreeSet<&String> = graph.processes.values().map(|p| &p.declared_type).collect();
            prop_assert_eq!(features.keys().collect::<BTreeSet<_>>(), types);

            let mut unioned = FeatureMap::new();
            for p in graph.processes.values() {
                let tags = process_tags(p, &graph, DanglingPolicy::Fail).unwrap();
                unioned.entry(p.declared_type.clone()).or_default().extend(tags);
            }
            prop_assert_eq!(features, unioned);
        }
    }
}

