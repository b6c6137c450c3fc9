//! AI shadow of a unit.

use crate::object::{AiObject, AiObjectCore, IntegrityStatus};
use crate::session::{AiError, AiMain};
use crate::world_view::WorldView;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use tradewind_core::{DecodeError, Element, ObjectId, ObjectKind};
use tradewind_world::Unit;

/// What the AI has told a unit to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mission {
    /// Wait for orders.
    Idle,
    /// Visit a settlement and speak to its chief.
    Scout {
        /// Target settlement.
        settlement: ObjectId,
    },
    /// Hunt foreign shipping.
    Privateer,
    /// Carry AI goods.
    Transport {
        /// Goods on board or to collect.
        goods: Vec<ObjectId>,
    },
}

impl Mission {
    fn kind(&self) -> &'static str {
        match self {
            Mission::Idle => "idle",
            Mission::Scout { .. } => "scout",
            Mission::Privateer => "privateer",
            Mission::Transport { .. } => "transport",
        }
    }

    fn write(&self, element: Element) -> Element {
        let element = element.with_attr("mission", self.kind());
        match self {
            Mission::Scout { settlement } => element.with_attr("target", settlement),
            Mission::Transport { goods } => element.with_attr(
                "goods",
                goods.iter().map(ObjectId::as_str).collect::<Vec<_>>().join(","),
            ),
            Mission::Idle | Mission::Privateer => element,
        }
    }

    fn read(element: &Element) -> Result<Self, DecodeError> {
        match element.attr_or("mission", "idle") {
            "idle" => Ok(Mission::Idle),
            "scout" => Ok(Mission::Scout {
                settlement: element.id_attr("target")?,
            }),
            "privateer" => Ok(Mission::Privateer),
            "transport" => {
                let raw = element.attr_or("goods", "");
                let goods = raw
                    .split(',')
                    .filter(|part| !part.is_empty())
                    .map(|part| {
                        ObjectId::parse(part).map_err(|err| DecodeError::InvalidAttribute {
                            tag: element.tag().to_string(),
                            attribute: "goods".to_string(),
                            value: raw.to_string(),
                            reason: err.to_string(),
                        })
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Mission::Transport { goods })
            }
            other => Err(DecodeError::InvalidAttribute {
                tag: element.tag().to_string(),
                attribute: "mission".to_string(),
                value: other.to_string(),
                reason: "unknown mission".to_string(),
            }),
        }
    }
}

/// AI state for one unit, addressed by the unit's identifier.
pub struct AiUnit {
    core: AiObjectCore,
    mission: Mutex<Mission>,
}

impl AiUnit {
    /// Persisted tag.
    pub const TAG: &'static str = "aiUnit";

    /// Shadow `unit` in `main`. The object is not registered yet.
    pub fn new(main: &Arc<AiMain>, unit: &Unit) -> Arc<Self> {
        Arc::new(Self {
            core: AiObjectCore::new(main, unit.id.clone()),
            mission: Mutex::new(Mission::Idle),
        })
    }

    /// Shadow `unit` and register it.
    pub fn register(main: &Arc<AiMain>, unit: &Unit) -> Result<Arc<Self>, AiError> {
        let ai_unit = Self::new(main, unit);
        main.register(ai_unit.clone())?;
        Ok(ai_unit)
    }

    pub(crate) fn read_element(
        main: &Arc<AiMain>,
        element: &Element,
    ) -> Result<Arc<Self>, DecodeError> {
        element.expect_tag(Self::TAG)?;
        Ok(Arc::new(Self {
            core: AiObjectCore::new(main, element.id_attr("id")?),
            mission: Mutex::new(Mission::read(element)?),
        }))
    }

    fn lock(&self) -> MutexGuard<'_, Mission> {
        match self.mission.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("mission lock poisoned for {}", self.core.id()),
        }
    }

    /// Current mission.
    pub fn mission(&self) -> Mission {
        self.lock().clone()
    }

    /// Replace the mission.
    pub fn set_mission(&self, mission: Mission) {
        debug!(unit = %self.core.id(), mission = mission.kind(), "assigned mission");
        *self.lock() = mission;
    }
}

impl fmt::Debug for AiUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiUnit")
            .field("core", &self.core)
            .field("mission", &self.mission())
            .finish()
    }
}

impl AiObject for AiUnit {
    fn core(&self) -> &AiObjectCore {
        &self.core
    }

    fn check_integrity(&self, world: &dyn WorldView, fix: bool) -> IntegrityStatus {
        let base = self.core.check_integrity();
        if base == IntegrityStatus::ProblemsRemain {
            return base;
        }
        if !world.has_object(self.core.id(), ObjectKind::Unit) {
            return IntegrityStatus::ProblemsRemain;
        }

        let mut mission = self.lock();
        let stale_target = match &*mission {
            Mission::Scout { settlement } => !world.has_object(settlement, ObjectKind::Settlement),
            _ => false,
        };
        match (stale_target, fix) {
            (false, _) => base,
            (true, true) => {
                *mission = Mission::Idle;
                IntegrityStatus::Fixed
            }
            (true, false) => IntegrityStatus::ProblemsRemain,
        }
    }

    fn to_element(&self) -> Element {
        self.lock()
            .write(Element::new(Self::TAG).with_attr("id", self.core.id()))
    }
}
