//! How each protocol turns an [`OgcException`] into an HTTP response.
//!
//! WMTS reports failures with a matching HTTP status. WMS always answers `200 OK`
//! and only the body tells the client that something went wrong.

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use actix_web::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use tilemap_core::ogc::{ExceptionCode, ExceptionEnvelope, OgcException};
use tracing::{debug, error};

const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

pub trait ExceptionPolicy {
    fn status(&self, code: ExceptionCode) -> StatusCode;

    fn envelope(&self) -> ExceptionEnvelope;

    /// Renders `exception` as a complete response.
    fn respond(&self, exception: &OgcException) -> HttpResponse {
        debug!("Responding with {exception}");
        match self.envelope().render(exception) {
            Ok(body) => HttpResponse::build(self.status(exception.code))
                .insert_header((CONTENT_TYPE, XML_CONTENT_TYPE))
                .insert_header((CACHE_CONTROL, "no-cache"))
                .body(body),
            Err(e) => {
                error!("Unable to render exception report for {exception}: {e}");
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WmtsPolicy;

impl ExceptionPolicy for WmtsPolicy {
    fn status(&self, code: ExceptionCode) -> StatusCode {
        match code {
            ExceptionCode::MissingParameterValue
            | ExceptionCode::MissingParameter
            | ExceptionCode::InvalidParameterValue
            | ExceptionCode::OperationNotSupported => StatusCode::BAD_REQUEST,
            ExceptionCode::NotFound => StatusCode::NOT_FOUND,
            ExceptionCode::NoApplicableCode => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn envelope(&self) -> ExceptionEnvelope {
        ExceptionEnvelope::WmtsReport
    }
}

/// WMS reports a bad `SERVICE` differently from errors of a specific request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmsPolicy {
    Service,
    Request,
}

impl ExceptionPolicy for WmsPolicy {
    fn status(&self, _code: ExceptionCode) -> StatusCode {
        StatusCode::OK
    }

    fn envelope(&self) -> ExceptionEnvelope {
        match self {
            Self::Service => ExceptionEnvelope::WmsServiceReport,
            Self::Request => ExceptionEnvelope::WmsServiceExceptionReport,
        }
    }
}

/// Successful XML response.
pub fn xml_response(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, XML_CONTENT_TYPE))
        .body(body)
}

#[cfg(test)]
mod tests {
    use actix_web::body::to_bytes;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ExceptionCode::MissingParameterValue, StatusCode::BAD_REQUEST)]
    #[case(ExceptionCode::MissingParameter, StatusCode::BAD_REQUEST)]
    #[case(ExceptionCode::InvalidParameterValue, StatusCode::BAD_REQUEST)]
    #[case(ExceptionCode::OperationNotSupported, StatusCode::BAD_REQUEST)]
    #[case(ExceptionCode::NotFound, StatusCode::NOT_FOUND)]
    #[case(ExceptionCode::NoApplicableCode, StatusCode::INTERNAL_SERVER_ERROR)]
    fn wmts_status(#[case] code: ExceptionCode, #[case] status: StatusCode) {
        assert_eq!(WmtsPolicy.status(code), status);
        assert_eq!(WmsPolicy::Request.status(code), StatusCode::OK);
    }

    #[actix_rt::test]
    async fn wms_bodies_differ_by_level() {
        let e = OgcException::new(ExceptionCode::InvalidParameterValue, "bad value");
        let service = WmsPolicy::Service.respond(&e);
        assert_eq!(service.status(), StatusCode::OK);
        let body = to_bytes(service.into_body()).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("ows:ExceptionReport"));

        let request = WmsPolicy::Request.respond(&e);
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            XML_CONTENT_TYPE
        );
        let body = to_bytes(request.into_body()).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("ServiceExceptionReport"));
    }
}
