use crate::ogc::OgcException;
use crate::ogc::xml::XmlBuilder;
use crate::tiles::TileResult;

const OWS_11_NAMESPACE: &str = "http://www.opengis.net/ows/1.1";
const OWS_NAMESPACE: &str = "http://www.opengis.net/ows";
const OGC_NAMESPACE: &str = "http://www.opengis.net/ogc";

/// XML shape an [`OgcException`] is wrapped in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExceptionEnvelope {
    /// WMTS `ows:ExceptionReport` in the OWS 1.1 namespace.
    WmtsReport,
    /// WMS service level `ows:ExceptionReport` in the OWS namespace.
    WmsServiceReport,
    /// WMS 1.1.1 `ServiceExceptionReport`.
    WmsServiceExceptionReport,
}

impl ExceptionEnvelope {
    /// Renders the exception as a complete XML document.
    pub fn render(self, exception: &OgcException) -> TileResult<String> {
        let mut xml = XmlBuilder::new()?;
        let code = exception.code.as_str();
        match self {
            Self::WmtsReport | Self::WmsServiceReport => {
                let ns = if self == Self::WmtsReport {
                    OWS_11_NAMESPACE
                } else {
                    OWS_NAMESPACE
                };
                xml.element(
                    "ows:ExceptionReport",
                    &[("xmlns:ows", ns), ("version", "1.0.0")],
                    |x| {
                        x.element("ows:Exception", &[("exceptionCode", code)], |x| {
                            x.text_element("ows:ExceptionText", &[], &exception.message)
                        })
                    },
                )?;
            }
            Self::WmsServiceExceptionReport => {
                xml.element(
                    "ServiceExceptionReport",
                    &[("version", "1.1.1"), ("xmlns", OGC_NAMESPACE)],
                    |x| x.text_element("ServiceException", &[("code", code)], &exception.message),
                )?;
            }
        }
        xml.finish()
    }
}
