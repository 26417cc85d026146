mod bid_api;
mod bid_store;
mod ride_api;
mod ride_store;

use oso::Oso;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

use crate::{
    api::API,
    auth::authorizor,
    db::create_schema,
    error::Error,
    events::{Emitter, EventPublisher},
};

type Database = Postgres;

/// The matching engine. Holds no ride state of its own: every operation reads and
/// writes through Postgres, using row locks on the ride as the per-ride critical section.
pub struct Engine {
    pool: Pool<Database>,
    authorizor: Oso,
    events: Emitter,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub async fn new(
        pool: Pool<Database>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, Error> {
        create_schema(&pool).await?;

        Ok(Self {
            pool,
            authorizor: authorizor::new()?,
            events: Emitter::new(publisher),
        })
    }
}

impl Engine {
    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(Error::forbidden())
    }
}

impl API for Engine {}
