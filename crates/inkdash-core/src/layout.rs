use std::str::FromStr;

use anyhow::anyhow;
use serde::Serialize;
use tracing::debug;

use crate::OutputMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LayoutPolicy {
    /// A baseline/maximum event count; events fill the space left after the
    /// todo block, and slack below the baseline widens the event gap.
    FixedCount,
    /// One total item budget split between events and todos, spaced evenly.
    EvenSpacing,
}

impl FromStr for LayoutPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fixed-count" | "fixedcount" | "fixed-count-with-slack" => Ok(Self::FixedCount),
            "even-spacing" | "evenspacing" | "fixed-total-even-spacing" => Ok(Self::EvenSpacing),
            other => Err(anyhow!("unknown layout policy: {other}")),
        }
    }
}

/// Pixel constants of the screen template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConstants {
    pub top_y: i32,
    pub bottom_y: i32,
    pub event_date_to_desc: i32,
    pub event_block_gap: i32,
    pub todo_date_to_desc: i32,
    pub todo_block_gap: i32,
    pub divider_gap: i32,
    pub divider_offset: i32,
    pub base_events: usize,
    pub max_events: usize,
    pub max_todos: usize,
    /// Placeholder slots the template provides.
    pub event_slots: usize,
    pub todo_slots: usize,
}

impl Default for LayoutConstants {
    fn default() -> Self {
        Self {
            top_y: 30,
            bottom_y: 480,
            event_date_to_desc: 26,
            event_block_gap: 24,
            todo_date_to_desc: 24,
            todo_block_gap: 16,
            divider_gap: 14,
            divider_offset: 4,
            base_events: 4,
            max_events: 6,
            max_todos: 3,
            event_slots: 10,
            todo_slots: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutSlot {
    /// 1-based template index.
    pub index: usize,
    pub primary_y: i32,
    pub secondary_y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Layout {
    pub events: Vec<LayoutSlot>,
    pub todos: Vec<LayoutSlot>,
    pub event_count: usize,
    pub todo_count: usize,
    /// 0 hides the divider.
    pub divider_y: i32,
    pub end_y: i32,
    #[serde(skip)]
    event_slots: usize,
    #[serde(skip)]
    todo_slots: usize,
}

impl Layout {
    /// Coordinates for every template slot. Slots past the active counts are
    /// zeroed and their text cleared so the template hides them.
    pub fn to_output(&self) -> OutputMap {
        let mut out = OutputMap::new();

        for index in 1..=self.event_slots {
            let slot = self.events.iter().find(|slot| slot.index == index);
            let (date_y, desc_y) = slot.map_or((0, 0), |s| (s.primary_y, s.secondary_y));
            out.insert(format!("EVENT_DATE_Y_{index}"), date_y.to_string());
            out.insert(format!("EVENT_DESC_Y_{index}"), desc_y.to_string());
            if slot.is_none() {
                out.insert(format!("CAL_DATETIME_{index}"), String::new());
                out.insert(format!("CAL_DATETIME_START_{index}"), String::new());
                out.insert(format!("CAL_DESC_{index}"), String::new());
            }
        }

        out.insert("DIVIDER_Y".to_string(), self.divider_y.to_string());

        for index in 1..=self.todo_slots {
            let slot = self.todos.iter().find(|slot| slot.index == index);
            let (date_y, desc_y) = slot.map_or((0, 0), |s| (s.primary_y, s.secondary_y));
            out.insert(format!("TODO_DATE_Y_{index}"), date_y.to_string());
            out.insert(format!("TODO_DESC_Y_{index}"), desc_y.to_string());
            if slot.is_none() {
                out.insert(format!("TODO_DATETIME_{index}"), String::new());
                out.insert(format!("TODO_DESC_{index}"), String::new());
            }
        }

        out
    }
}

/// Places `count` blocks starting at `top`, returning the slots and the y
/// where the next block would start.
fn place_blocks(count: usize, top: i32, date_to_desc: i32, gap: i32) -> (Vec<LayoutSlot>, i32) {
    let mut y = top;
    let mut slots = Vec::with_capacity(count);
    for index in 1..=count {
        slots.push(LayoutSlot {
            index,
            primary_y: y,
            secondary_y: y + date_to_desc,
        });
        y += date_to_desc + gap;
    }
    (slots, y)
}

fn to_px(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// Computes slot positions for the chosen policy. `todo_request` and
/// `total_items` are the already-parsed configuration knobs; both are
/// clamped here.
#[tracing::instrument(skip(constants))]
pub fn compute(
    policy: LayoutPolicy,
    constants: &LayoutConstants,
    todo_request: usize,
    total_items: usize,
) -> Layout {
    let layout = match policy {
        LayoutPolicy::FixedCount => fixed_count(constants, todo_request),
        LayoutPolicy::EvenSpacing => even_spacing(constants, todo_request, total_items),
    };
    debug!(
        events = layout.event_count,
        todos = layout.todo_count,
        divider_y = layout.divider_y,
        end_y = layout.end_y,
        "computed layout"
    );
    layout
}

fn fixed_count(c: &LayoutConstants, todo_request: usize) -> Layout {
    let todo_count = todo_request.min(c.max_todos).min(c.todo_slots);

    let reserved = if todo_count > 0 {
        c.divider_offset
            + c.divider_gap
            + to_px(todo_count) * (c.todo_date_to_desc + c.todo_block_gap)
    } else {
        0
    };

    let event_min_height = c.event_date_to_desc + c.event_block_gap;
    let available = c.bottom_y - c.top_y - reserved;
    let event_fit = if event_min_height > 0 {
        usize::try_from(available.max(0) / event_min_height).unwrap_or(0)
    } else {
        c.max_events
    };
    let event_count = event_fit
        .max(c.base_events)
        .min(c.max_events)
        .min(c.event_slots);

    let mut event_gap = c.event_block_gap;
    let (mut events, mut y) = place_blocks(event_count, c.top_y, c.event_date_to_desc, event_gap);

    let remaining = c.bottom_y - y - reserved;
    if remaining > 20 && event_count > 0 && event_count <= c.base_events {
        event_gap += remaining / to_px(event_count);
        (events, y) = place_blocks(event_count, c.top_y, c.event_date_to_desc, event_gap);
    }

    let (divider_y, todos, end_y) = place_todos(c, todo_count, y, c.todo_block_gap);

    Layout {
        events,
        todos,
        event_count,
        todo_count,
        divider_y,
        end_y,
        event_slots: c.event_slots,
        todo_slots: c.todo_slots,
    }
}

fn even_spacing(c: &LayoutConstants, todo_request: usize, total_items: usize) -> Layout {
    let total = total_items.clamp(1, c.event_slots.max(1));
    let todo_count = todo_request.min(total - 1).min(c.todo_slots);
    let event_count = total - todo_count;

    let divider_space = if todo_count > 0 {
        c.divider_offset + c.divider_gap
    } else {
        0
    };
    let slack = c.bottom_y
        - c.top_y
        - to_px(event_count) * c.event_date_to_desc
        - to_px(todo_count) * c.todo_date_to_desc
        - divider_space;
    let gap = if total > 1 {
        slack.max(0) / to_px(total - 1)
    } else {
        0
    };

    let (events, y) = place_blocks(event_count, c.top_y, c.event_date_to_desc, gap);
    let (divider_y, todos, end_y) = place_todos(c, todo_count, y, gap);

    Layout {
        events,
        todos,
        event_count,
        todo_count,
        divider_y,
        end_y,
        event_slots: c.event_slots,
        todo_slots: c.todo_slots,
    }
}

/// Divider sits just below the event block; todos follow it.
fn place_todos(
    c: &LayoutConstants,
    todo_count: usize,
    y: i32,
    gap: i32,
) -> (i32, Vec<LayoutSlot>, i32) {
    if todo_count == 0 {
        return (0, Vec::new(), y);
    }
    let divider_y = y + c.divider_offset;
    let (todos, end_y) = place_blocks(
        todo_count,
        divider_y + c.divider_gap,
        c.todo_date_to_desc,
        gap,
    );
    (divider_y, todos, end_y)
}
