//! Folds filtered messages into display groups and keeps the aggregate
//! working indicator in step with streaming and pending-tool state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::debug;

use crate::model::{Message, ToolInvocation};
use crate::source::{ConversationSource, SourceError};
use crate::viewmodel::events::SubscriptionId;
use crate::viewmodel::filter::display_messages;
use crate::viewmodel::group::{BlockView, DisplayGroup, GroupEvent, GroupId};

/// Inputs feeding the working indicator: the streaming flag plus the
/// per-group pending-tool flags.
#[derive(Debug)]
struct AggregateState {
    is_streaming: bool,
    pending_groups: BTreeMap<GroupId, bool>,
}

impl AggregateState {
    fn has_pending(&self) -> bool {
        self.pending_groups.values().any(|pending| *pending)
    }

    /// Streaming, but not while a tool result is already in and merely
    /// pending display: the tool's own in-progress affordance takes over
    /// from the generic indicator.
    fn show_working_indicator(&self) -> bool {
        self.is_streaming && !self.has_pending()
    }
}

/// Shared aggregator handle; group listeners hold clones of it.
#[derive(Debug, Clone)]
struct Aggregate {
    state: Arc<Mutex<AggregateState>>,
    indicator_tx: Arc<watch::Sender<bool>>,
}

impl Aggregate {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (indicator_tx, indicator_rx) = watch::channel(false);
        let aggregate = Self {
            state: Arc::new(Mutex::new(AggregateState {
                is_streaming: false,
                pending_groups: BTreeMap::new(),
            })),
            indicator_tx: Arc::new(indicator_tx),
        };
        (aggregate, indicator_rx)
    }

    fn lock(&self) -> MutexGuard<'_, AggregateState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Apply a mutation, then publish the derived indicator if it flipped.
    fn update(&self, apply: impl FnOnce(&mut AggregateState)) {
        let indicator = {
            let mut state = self.lock();
            apply(&mut state);
            state.show_working_indicator()
        };
        self.indicator_tx.send_if_modified(|current| {
            if *current != indicator {
                *current = indicator;
                true
            } else {
                false
            }
        });
    }

    fn is_streaming(&self) -> bool {
        self.lock().is_streaming
    }

    fn has_pending(&self) -> bool {
        self.lock().has_pending()
    }

    fn show_working_indicator(&self) -> bool {
        self.lock().show_working_indicator()
    }
}

/// The conversation engine: owns the display groups, drives loads from the
/// data source, and exposes the observable working indicator.
pub struct ConversationViewModel {
    source: Box<dyn ConversationSource>,
    groups: Vec<DisplayGroup>,
    /// One entry per live group; torn down with the group on reload.
    subscriptions: Vec<(GroupId, SubscriptionId)>,
    next_group_id: GroupId,
    aggregate: Aggregate,
    indicator_rx: watch::Receiver<bool>,
}

impl ConversationViewModel {
    pub fn new(source: Box<dyn ConversationSource>) -> Self {
        let (aggregate, indicator_rx) = Aggregate::new();
        Self {
            source,
            groups: Vec::new(),
            subscriptions: Vec::new(),
            next_group_id: 0,
            aggregate,
            indicator_rx,
        }
    }

    /// Reload the transcript from the data source. The streaming flag is
    /// set for the duration of the fetch and cleared on every exit path,
    /// so the indicator never sticks on after a failed load.
    pub async fn load_conversation(&mut self) -> Result<(), SourceError> {
        self.set_streaming(true);
        match self.source.fetch_transcript().await {
            Ok(messages) => {
                self.replace_conversation(messages);
                self.set_streaming(false);
                Ok(())
            }
            Err(err) => {
                self.set_streaming(false);
                Err(err)
            }
        }
    }

    /// Rebuild all groups from a raw transcript. Prior groups and their
    /// listeners are torn down first; a load never merges with old state.
    pub fn replace_conversation(&mut self, raw_messages: Vec<Message>) {
        self.clear_groups();
        for message in display_messages(raw_messages) {
            let start_new = match self.groups.last() {
                Some(group) => group.kind() != message.kind,
                None => true,
            };
            if start_new {
                self.push_group(message);
            } else if let Some(group) = self.groups.last_mut() {
                group.append(message);
            }
        }
        debug!(groups = self.groups.len(), "conversation rebuilt");
    }

    fn push_group(&mut self, message: Message) {
        let id = self.next_group_id;
        self.next_group_id += 1;

        let mut group = DisplayGroup::from_message(id, message);
        let aggregate = self.aggregate.clone();
        let subscription = group.subscribe(move |event| {
            if let GroupEvent::PendingChanged(pending) = *event {
                aggregate.update(|state| {
                    state.pending_groups.insert(id, pending);
                });
            }
        });
        self.subscriptions.push((id, subscription));

        // Seed the aggregate with the flag as of group construction; the
        // listener above covers every later flip.
        let pending = group.has_pending_tool_result();
        self.aggregate.update(|state| {
            state.pending_groups.insert(id, pending);
        });
        self.groups.push(group);
    }

    fn clear_groups(&mut self) {
        for group in &mut self.groups {
            if let Some(position) = self
                .subscriptions
                .iter()
                .position(|(group_id, _)| *group_id == group.id())
            {
                let (_, subscription) = self.subscriptions.remove(position);
                group.unsubscribe(subscription);
            }
        }
        debug_assert!(self.subscriptions.is_empty());
        self.groups.clear();
        self.aggregate.update(|state| state.pending_groups.clear());
    }

    /// Re-synchronize every group's tool blocks against their invocations.
    /// Called by whatever resolves tool results after mutating them.
    pub fn synchronize_tools(&mut self) -> bool {
        let mut changed = false;
        for group in &mut self.groups {
            changed |= group.synchronize_tools();
        }
        changed
    }

    /// Flip the streaming flag; the load driver owns this.
    pub fn set_streaming(&mut self, is_streaming: bool) {
        self.aggregate
            .update(|state| state.is_streaming = is_streaming);
    }

    /// Toggle a group's overflow text. Returns false when the index is out
    /// of range or the group has nothing hidden.
    pub fn toggle_expand(&mut self, index: usize) -> bool {
        self.groups
            .get_mut(index)
            .map(DisplayGroup::toggle_expand)
            .unwrap_or(false)
    }

    pub fn groups(&self) -> &[DisplayGroup] {
        &self.groups
    }

    pub fn is_streaming(&self) -> bool {
        self.aggregate.is_streaming()
    }

    pub fn has_pending_tool_results(&self) -> bool {
        self.aggregate.has_pending()
    }

    pub fn show_working_indicator(&self) -> bool {
        self.aggregate.show_working_indicator()
    }

    /// Observable working indicator; receivers wake on every flip.
    pub fn watch_working_indicator(&self) -> watch::Receiver<bool> {
        self.indicator_rx.clone()
    }

    /// Invocations still awaiting a result, across all groups.
    pub fn pending_invocations(&self) -> Vec<Arc<ToolInvocation>> {
        self.groups
            .iter()
            .flat_map(DisplayGroup::blocks)
            .filter_map(|block| match block {
                BlockView::ToolUse(tool) if tool.is_pending() => {
                    Some(Arc::clone(tool.invocation()))
                }
                _ => None,
            })
            .collect()
    }
}
