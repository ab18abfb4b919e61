use crate::constants::{SRC_ATTRIBUTE, SRCSET_ATTRIBUTE};
use crate::{Document, ElementKind, Mutation, is_placeholder_url};

/// Where the bridge is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObserverPhase {
    /// No observer installed
    #[default]
    Detached,
    /// Watching the document root for `<body>` to appear
    AwaitingBody,
    /// Watching the body subtree
    Observing,
}

/// A node the bridge wants the policy to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route<Node> {
    /// The `<img>` or `<source>` to evaluate
    pub node: Node,
    /// Whether the page rewrote the node's source, so an earlier decision
    /// about it no longer holds
    pub reset: bool,
}

/// Turns raw mutation records into the elements the policy has to
/// (re)evaluate.
///
/// Writes made by the policy itself always leave a placeholder behind, and
/// attribute changes to a placeholder are never routed, so replacing an
/// image cannot feed back into another replacement.
#[derive(Debug, Clone, Default)]
pub struct ObserverBridge {
    phase: ObserverPhase,
}

impl ObserverBridge {
    /// The current phase.
    pub fn phase(&self) -> ObserverPhase {
        self.phase
    }

    /// Install the body observer, or the bootstrap observer if the parser
    /// has not produced `<body>` yet. Starting twice is a no-op.
    pub fn start<D: Document>(&mut self, dom: &mut D) {
        if self.phase != ObserverPhase::Detached {
            return;
        }

        self.phase = match dom.body() {
            Some(body) => {
                dom.observe_body(&body);
                ObserverPhase::Observing
            }
            None => {
                tracing::debug!("No body yet, waiting for it");
                dom.observe_root();
                ObserverPhase::AwaitingBody
            }
        };
    }

    /// Route a batch of mutation records.
    pub fn collect<D: Document>(
        &mut self,
        dom: &mut D,
        mutations: Vec<Mutation<D::Node>>,
    ) -> Vec<Route<D::Node>> {
        let mut routes = Vec::new();

        for mutation in mutations {
            match mutation {
                Mutation::ChildList { .. } if self.phase == ObserverPhase::AwaitingBody => {
                    if let Some(body) = dom.body() {
                        tracing::debug!("Body appeared, observing it");
                        dom.observe_body(&body);
                        dom.disconnect_root();
                        self.phase = ObserverPhase::Observing;
                    }
                }
                Mutation::ChildList { added } => {
                    for node in added {
                        if matches!(dom.kind(&node), ElementKind::Image | ElementKind::Source) {
                            routes.push(Route {
                                node: node.clone(),
                                reset: false,
                            });
                        }
                        routes.extend(
                            dom.images(Some(&node))
                                .into_iter()
                                .chain(dom.picture_sources(Some(&node)))
                                .map(|node| Route { node, reset: false }),
                        );
                    }
                }
                Mutation::Attribute { target, name } => {
                    let relevant = match dom.kind(&target) {
                        ElementKind::Image => name == SRC_ATTRIBUTE,
                        ElementKind::Source => name == SRCSET_ATTRIBUTE,
                        _ => false,
                    };
                    let value = dom.attribute(&target, &name).unwrap_or_default();
                    if relevant && !is_placeholder_url(&value) {
                        routes.push(Route {
                            node: target,
                            reset: true,
                        });
                    }
                }
            }
        }

        routes
    }
}
