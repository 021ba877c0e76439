//! Update function for the TEA pattern.
//!
//! Takes the model and a message, mutates the model, and returns the
//! commands to execute. All filter decisions and presenter transitions
//! happen here, so they are serialized by construction.

use tokio::time::Instant;

use crate::filter::{Decision, TitleRequest};
use crate::thread::NotificationEvent;
use crate::{plog, plog_debug};

use super::command::Command;
use super::message::Message;
use super::model::Model;

/// Model + Message → Commands
pub fn update(model: &mut Model, msg: Message) -> Vec<Command> {
    let mut cmds = Vec::new();

    match msg {
        Message::MembershipChanged { kind, threads } => {
            plog_debug!(
                "Message::MembershipChanged kind={} threads={}",
                kind,
                threads.len()
            );
            cmds.push(Command::Reconcile { kind, threads });
        }

        Message::TailObserved {
            thread,
            tail,
            observed_at,
        } => {
            model.stats.observed += 1;
            model.dirty = true;
            match model
                .filter
                .evaluate(&thread, &tail, &model.view, observed_at)
            {
                Decision::Discard(_) => model.stats.discarded += 1,
                Decision::Surface(TitleRequest::Ready(event)) => {
                    show(model, event, &mut cmds);
                }
                Decision::Surface(request) => {
                    cmds.push(Command::ResolveTitle(request));
                }
            }
        }

        Message::TitleResolved { event } => {
            show(model, event, &mut cmds);
        }

        Message::ViewChanged(view) => {
            plog_debug!("Message::ViewChanged route={}", view.route);
            model.view = view;
            model.dirty = true;
        }

        Message::DismissTimerElapsed { generation } => {
            if model.presenter.expire(generation) {
                model.dirty = true;
            }
        }

        Message::Dismiss { generation } => {
            if model.presenter.dismiss(generation) {
                cmds.push(Command::CancelDismissTimer);
                model.dirty = true;
            }
        }

        Message::Activate { generation } => {
            if let Some(route) = model.presenter.activate(generation) {
                plog!("Notification activated, navigating to {}", route);
                cmds.push(Command::CancelDismissTimer);
                cmds.push(Command::Navigate(route));
                model.dirty = true;
            }
        }
    }

    cmds
}

fn show(model: &mut Model, event: NotificationEvent, cmds: &mut Vec<Command>) {
    plog!(
        "Showing notification thread={}:{} title={:?}",
        event.kind,
        event.thread_id,
        event.title
    );
    let generation = model.presenter.show(event, Instant::now());
    model.stats.surfaced += 1;
    model.dirty = true;
    cmds.push(Command::ArmDismissTimer {
        generation,
        after: model.config.display_duration(),
    });
}
