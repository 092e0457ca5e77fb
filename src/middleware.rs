use crate::AppState;
use crate::auth::{SessionUser, session_from_request};
use crate::error::ApiError;
use crate::models::Role;
use actix_web::{
    Error, HttpMessage,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    web,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use std::task::{Context, Poll};

/// Rejects requests without a session; optionally also requires the ADMIN role.
///
/// The resolved [`SessionUser`] is stored in the request extensions so the
/// `CurrentUser` extractor does not have to parse the cookie a second time.
#[derive(Clone, Copy, Default)]
pub struct Authorization {
    admin_only: bool,
}

impl Authorization {
    pub fn session() -> Self {
        Self { admin_only: false }
    }

    pub fn admin() -> Self {
        Self { admin_only: true }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authorization
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthorizationMW<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthorizationMW {
            service: Rc::new(service),
            admin_only: self.admin_only,
        }))
    }
}

pub struct AuthorizationMW<S> {
    service: Rc<S>,
    admin_only: bool,
}

impl<S, B> Service<ServiceRequest> for AuthorizationMW<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let secret = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.config.jwt_secret.clone())
            .unwrap_or_default();

        let session = session_from_request(req.request(), &secret);
        let rejection = match &session {
            None => Some(ApiError::Unauthorized(
                "Authentication required".to_string(),
            )),
            Some(user) if self.admin_only && user.role != Role::Admin => {
                log::warn!("user {} ({}) denied admin route {}", user.id, user.role, req.path());
                Some(ApiError::Forbidden(
                    "Only administrators may perform this action".to_string(),
                ))
            }
            Some(_) => None,
        };

        if let Some(err) = rejection {
            let res = req.error_response(err).map_into_right_body();
            return Box::pin(async move { Ok(res) });
        }

        if let Some(user) = session {
            req.extensions_mut().insert::<SessionUser>(user);
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}
