//! Nav-row buttons: page change and sort.

use super::{Click, Outcome};
use crate::engine::{persist, StashEngine};
use crate::host::Host;
use crate::layout::page_count;
use crate::render::{commit_visible, redraw_sort_button, render};
use crate::sort::sort_contents;
use crate::store::RecordStore;
use crate::{ActorId, EngineEvent, PersistReason, Result};

impl StashEngine {
    pub(super) fn change_page(&mut self, host: &mut dyn Host, actor: ActorId, forward: bool) -> Outcome {
        let now = self.quantum;
        let constants = &self.content.constants;
        let Some(session) = self.sessions.get_mut(actor) else {
            return Outcome::Rejected;
        };
        if !session.paginated {
            return Outcome::Rejected;
        }
        if host.cursor(actor).is_some() {
            tracing::debug!(actor = %actor, "page change refused: cursor holds an item");
            return Outcome::Rejected;
        }
        if session
            .last_storage_edit
            .is_some_and(|t| now.saturating_sub(t) < constants.quiet_window_quanta)
        {
            tracing::debug!(actor = %actor, "page change refused: storage edit in flight");
            return Outcome::Rejected;
        }
        let (Some(record), Some(def)) = (
            self.records.get_mut(&session.container),
            self.content.container_def(&session.type_id),
        ) else {
            return Outcome::Rejected;
        };

        let target = if forward {
            session.page + 1
        } else {
            match session.page.checked_sub(1) {
                Some(page) => page,
                None => return Outcome::Rejected,
            }
        };
        if target >= page_count(record.contents.len()) {
            return Outcome::Rejected;
        }

        commit_visible(session, record);
        session.page = target;
        render(session, record, def, &self.content);
        self.saves
            .arm(actor, session.container, now + constants.debounce_quanta.max(1));
        host.show_view(actor, &session.title, &session.visible);

        tracing::debug!(actor = %actor, container = %session.container, page = target, "page changed");
        self.log.emit(
            now,
            EngineEvent::PageChanged {
                actor,
                container: session.container,
                page: target,
            },
        );
        Outcome::Applied
    }

    /// Primary sorts and persists; secondary only cycles the mode.
    pub(super) fn sort_click(
        &mut self,
        store: &mut dyn RecordStore,
        host: &mut dyn Host,
        actor: ActorId,
        click: Click,
    ) -> Result<Outcome> {
        let now = self.quantum;
        let Some(session) = self.sessions.get_mut(actor) else {
            return Ok(Outcome::Rejected);
        };
        let (Some(record), Some(def)) = (
            self.records.get_mut(&session.container),
            self.content.container_def(&session.type_id),
        ) else {
            return Ok(Outcome::Rejected);
        };

        match click {
            Click::Secondary => {
                session.sort_mode = session.sort_mode.next();
                redraw_sort_button(session, &self.content);
            }
            Click::Primary => {
                commit_visible(session, record);
                sort_contents(&mut record.contents, session.sort_mode, &self.content.items);
                self.saves.cancel(actor, session.container);
                persist(
                    store,
                    record,
                    &self.content,
                    PersistReason::Sort,
                    now,
                    &mut self.log,
                )?;
                render(session, record, def, &self.content);
                self.log.emit(
                    now,
                    EngineEvent::Sorted {
                        container: session.container,
                        mode: session.sort_mode,
                    },
                );
            }
            _ => return Ok(Outcome::Rejected),
        }
        host.show_view(actor, &session.title, &session.visible);
        Ok(Outcome::Applied)
    }
}
