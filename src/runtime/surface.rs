//! 宿主界面 - 一个引擎实例加一个脚本桥接器

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::js::{BridgeEvent, ScriptBridge};
use crate::renderer::{Engine, EngineRequest};
use tracing::{debug, warn};

/// 单次 pump 最多处理的轮数，防止脚本在事件里无限重渲染
const MAX_PUMP_ROUNDS: usize = 64;

/// 一次 pump 的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpReport {
    pub submissions: usize,
    pub rejected: usize,
    pub images: usize,
    pub events: usize,
    pub stale_events: usize,
    pub requests: Vec<EngineRequest>,
}

/// 宿主界面，拆除时引擎、控件树、事件表和图片缓存一起释放
#[derive(Debug)]
pub struct Surface {
    engine: Engine,
    bridge: ScriptBridge,
}

impl Surface {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self { engine: Engine::new(config), bridge: ScriptBridge::new()? })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn bridge(&self) -> &ScriptBridge {
        &self.bridge
    }

    /// 执行应用脚本并处理它产生的提交
    pub fn load_script(&mut self, code: &str) -> Result<PumpReport, EngineError> {
        self.bridge.load_script(code)?;
        Ok(self.pump())
    }

    /// 处理脚本提交、图片结果和待分发事件，直到没有新的工作
    pub fn pump(&mut self) -> PumpReport {
        let mut report = PumpReport::default();

        for _ in 0..MAX_PUMP_ROUNDS {
            let mut progressed = self.apply_submissions(&mut report) > 0;

            report.images += self.engine.pump();

            // 脚本重渲染会重置它的事件表，同一批里剩下的事件 id 已经失效
            let mut rerendered = false;
            for event in self.engine.drain_events() {
                progressed = true;
                if rerendered || !self.engine.is_current(&event) {
                    debug!(event_id = event.id, "dropping event from a replaced tree");
                    report.stale_events += 1;
                    continue;
                }
                match self.bridge.dispatch(&event) {
                    Ok(()) => report.events += 1,
                    Err(err) => warn!(event_id = event.id, %err, "script dispatch failed"),
                }
                rerendered = self.apply_submissions(&mut report) > 0;
            }

            if !progressed {
                break;
            }
        }

        report.requests = self.engine.drain_requests();
        report
    }

    /// 把脚本排队的树交给引擎，返回提交次数（含被拒绝的）
    fn apply_submissions(&mut self, report: &mut PumpReport) -> usize {
        let mut submitted = 0;
        for event in self.bridge.drain_events() {
            if let BridgeEvent::SubmitTree(json) = event {
                submitted += 1;
                match self.engine.submit(&json) {
                    Ok(_) => report.submissions += 1,
                    Err(_) => report.rejected += 1,
                }
            }
        }
        submitted
    }
}
