//! AI bookkeeping for goods in transit.

use crate::object::{AiObject, AiObjectCore, IntegrityStatus};
use crate::session::{AiError, AiMain};
use crate::world_view::WorldView;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tradewind_core::{DecodeError, Element, ElementCodec, Goods, ObjectId, ObjectKind};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Route {
    location: ObjectId,
    destination: Option<ObjectId>,
}

/// Goods the AI plans to move. Goods are not model entities, so these
/// objects get their own `aiGoods:N` identifiers.
pub struct AiGoods {
    core: AiObjectCore,
    goods: Goods,
    route: Mutex<Route>,
}

impl AiGoods {
    /// Persisted tag.
    pub const TAG: &'static str = "aiGoods";

    /// Register `goods` held by the unit `location`, bound for `destination`.
    pub fn register(
        main: &Arc<AiMain>,
        goods: Goods,
        location: ObjectId,
        destination: Option<ObjectId>,
    ) -> Result<Arc<Self>, AiError> {
        let ai_goods = Arc::new(Self {
            core: AiObjectCore::new(main, main.allocate_id("aiGoods")),
            goods,
            route: Mutex::new(Route {
                location,
                destination,
            }),
        });
        main.register(ai_goods.clone())?;
        Ok(ai_goods)
    }

    pub(crate) fn read_element(
        main: &Arc<AiMain>,
        element: &Element,
    ) -> Result<Arc<Self>, DecodeError> {
        element.expect_tag(Self::TAG)?;
        let destination = element
            .attr("destination")
            .map(|_| element.id_attr("destination"))
            .transpose()?;
        Ok(Arc::new(Self {
            core: AiObjectCore::new(main, element.id_attr("id")?),
            goods: element.child_as::<Goods>(0)?,
            route: Mutex::new(Route {
                location: element.id_attr("location")?,
                destination,
            }),
        }))
    }

    fn lock(&self) -> MutexGuard<'_, Route> {
        match self.route.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("route lock poisoned for {}", self.core.id()),
        }
    }

    /// The goods.
    pub fn goods(&self) -> &Goods {
        &self.goods
    }

    /// Unit carrying the goods.
    pub fn location(&self) -> ObjectId {
        self.lock().location.clone()
    }

    /// Where the goods should go, if decided.
    pub fn destination(&self) -> Option<ObjectId> {
        self.lock().destination.clone()
    }
}

impl fmt::Debug for AiGoods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiGoods")
            .field("core", &self.core)
            .field("goods", &self.goods)
            .field("route", &*self.lock())
            .finish()
    }
}

impl AiObject for AiGoods {
    fn core(&self) -> &AiObjectCore {
        &self.core
    }

    fn check_integrity(&self, world: &dyn WorldView, fix: bool) -> IntegrityStatus {
        let base = self.core.check_integrity();
        if base == IntegrityStatus::ProblemsRemain || self.goods.amount == 0 {
            return IntegrityStatus::ProblemsRemain;
        }
        let mut route = self.lock();
        if !world.has_object(&route.location, ObjectKind::Unit) {
            return IntegrityStatus::ProblemsRemain;
        }
        let lost_destination = route
            .destination
            .as_ref()
            .is_some_and(|target| !world.has_object(target, ObjectKind::Settlement));
        match (lost_destination, fix) {
            (false, _) => base,
            (true, true) => {
                route.destination = None;
                IntegrityStatus::Fixed
            }
            (true, false) => IntegrityStatus::ProblemsRemain,
        }
    }

    fn to_element(&self) -> Element {
        let route = self.lock();
        Element::new(Self::TAG)
            .with_attr("id", self.core.id())
            .with_attr("location", &route.location)
            .with_opt_attr("destination", route.destination.as_ref())
            .with_child(self.goods.to_element())
    }
}
