use std::fmt::Display;

use color_eyre::eyre::Result;
use human_repr::{HumanCount, HumanThroughput};
use serde::{Deserialize, Serialize};

use crate::{model::NodeId, route::ExpansionPolicy};

/// Progress of a running search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteState {
    pub policy: ExpansionPolicy,
    pub from: NodeId,
    pub to: NodeId,
    pub node: NodeId,
    pub expanded: usize,
    pub queue_size: usize,
    pub d_rem: f32,
    pub d_total: f32,
    pub prc_done: f32,
    pub rate: f64,
    pub msg: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum Event {
    SearchState(RouteState),
    Message(String),
}

impl Display for RouteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            policy,
            from,
            to,
            node,
            expanded,
            queue_size,
            d_rem,
            d_total,
            prc_done,
            rate,
            msg,
        } = self;
        let policy = policy.name();
        let d_rem = d_rem.human_count_bare();
        let d_total = d_total.human_count_bare();
        let queued = queue_size.human_count_bare();
        let expanded = expanded.human_count_bare();
        let rate = rate.human_throughput("nodes");
        write!(
            f,
            "[{prc_done:.02}% | {policy} | #{from} -> #{to}] Node: #{node} | Remaining distance: {d_rem:.02} / {d_total:.02} | Queue: {queued} | Expanded: {expanded} | Rate: {rate}"
        )?;
        if let Some(msg) = msg.as_ref() {
            write!(f, " | {msg}")?;
        };
        Ok(())
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SearchState(state) => {
                write!(f, "{state}")?;
            }
            Self::Message(msg) => {
                write!(f, "{msg}")?;
            }
        }
        Ok(())
    }
}

pub type Callback = Box<dyn Fn(&Event) -> Result<()> + Send>;
