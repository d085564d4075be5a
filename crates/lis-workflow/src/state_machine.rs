//! 检验状态机
//!
//! 管理检验结果的生命周期状态转换：待出结果 → 已出结果 / 已取消

use lis_core::{ExamStatus, LisError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 检验状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExamEvent {
    Conclude,
    Cancel,
}

impl fmt::Display for ExamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamEvent::Conclude => f.write_str("conclude"),
            ExamEvent::Cancel => f.write_str("cancel"),
        }
    }
}

/// 检验状态机
#[derive(Debug)]
pub struct ExamStateMachine {
    transitions: HashMap<(ExamStatus, ExamEvent), ExamStatus>,
}

impl ExamStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 只有待出结果状态可以转换，两个终态没有出边
        transitions.insert((ExamStatus::Pending, ExamEvent::Conclude), ExamStatus::Concluded);
        transitions.insert((ExamStatus::Pending, ExamEvent::Cancel), ExamStatus::Canceled);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: ExamStatus, event: ExamEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: ExamStatus, event: ExamEvent) -> Result<ExamStatus> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(LisError::InvalidState {
                from: from.to_string(),
                event: event.to_string(),
            }),
        }
    }

    /// 获取所有可能的状态
    pub fn get_all_states() -> Vec<ExamStatus> {
        vec![ExamStatus::Pending, ExamStatus::Concluded, ExamStatus::Canceled]
    }

    /// 获取状态的所有可能事件
    pub fn get_possible_events(&self, current_state: ExamStatus) -> Vec<ExamEvent> {
        let mut events: Vec<ExamEvent> = self
            .transitions
            .keys()
            .filter(|(state, _)| *state == current_state)
            .map(|(_, event)| *event)
            .collect();
        events.sort_by_key(|event| *event as u8);
        events
    }
}

impl Default for ExamStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
