use crate::{Tablexl, TablexlBuilder, TablexlError};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyModule};

#[pyclass(name = "Converter")]
struct PyConverter {
    inner: Tablexl,
}

#[pymethods]
impl PyConverter {
    #[new]
    #[pyo3(
        signature = (
            inline_css=true,
            base_url=None,
            stylesheets=None,
            default_sheet_name=None,
            column_width_padding=0.0,
            debug_log=None,
            perf_log=None,
        )
    )]
    #[allow(clippy::too_many_arguments)]
    fn new(
        inline_css: bool,
        base_url: Option<String>,
        stylesheets: Option<Vec<String>>,
        default_sheet_name: Option<String>,
        column_width_padding: f64,
        debug_log: Option<String>,
        perf_log: Option<String>,
    ) -> PyResult<Self> {
        let mut builder = TablexlBuilder::new()
            .inline_css(inline_css)
            .column_width_padding(column_width_padding);
        if let Some(base) = base_url {
            builder = builder.base_url(base);
        }
        for css in stylesheets.unwrap_or_default() {
            builder = builder.stylesheet(css);
        }
        if let Some(name) = default_sheet_name {
            builder = builder.default_sheet_name(name);
        }
        if let Some(path) = debug_log {
            builder = builder.debug_log(path);
        }
        if let Some(path) = perf_log {
            builder = builder.perf_log(path);
        }
        let inner = builder.build().map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[pyo3(signature = (doc, filename, base_url=None))]
    fn document_to_xl(&self, doc: &str, filename: &str, base_url: Option<&str>) -> PyResult<()> {
        self.inner
            .document_to_xlsx(doc, filename, base_url)
            .map_err(to_py_err)
    }

    #[pyo3(signature = (doc, base_url=None))]
    fn document_to_xlsx_bytes<'py>(
        &self,
        py: Python<'py>,
        doc: &str,
        base_url: Option<&str>,
    ) -> PyResult<Bound<'py, PyBytes>> {
        let bytes = self
            .inner
            .document_to_xlsx_bytes(doc, base_url)
            .map_err(to_py_err)?;
        Ok(PyBytes::new_bound(py, &bytes))
    }

    #[pyo3(signature = (doc, base_url=None))]
    fn sheet_names(&self, doc: &str, base_url: Option<&str>) -> PyResult<Vec<String>> {
        let workbook = self
            .inner
            .document_to_workbook(doc, base_url, None)
            .map_err(to_py_err)?;
        Ok(workbook
            .sheet_names()
            .into_iter()
            .map(str::to_string)
            .collect())
    }
}

#[pyfunction]
#[pyo3(signature = (doc, filename, base_url=None))]
fn document_to_xl(doc: &str, filename: &str, base_url: Option<&str>) -> PyResult<()> {
    crate::document_to_xlsx(doc, filename, base_url).map_err(to_py_err)
}

#[pyfunction]
#[pyo3(signature = (doc, base_url=None))]
fn document_to_xlsx_bytes<'py>(
    py: Python<'py>,
    doc: &str,
    base_url: Option<&str>,
) -> PyResult<Bound<'py, PyBytes>> {
    let bytes = Tablexl::builder()
        .build()
        .and_then(|converter| converter.document_to_xlsx_bytes(doc, base_url))
        .map_err(to_py_err)?;
    Ok(PyBytes::new_bound(py, &bytes))
}

#[pyfunction]
fn sheet_names(doc: &str) -> PyResult<Vec<String>> {
    let workbook = crate::document_to_workbook(doc, None, None).map_err(to_py_err)?;
    Ok(workbook
        .sheet_names()
        .into_iter()
        .map(str::to_string)
        .collect())
}

#[pymodule]
fn _tablexl(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyConverter>()?;
    module.add_function(wrap_pyfunction!(document_to_xl, module)?)?;
    module.add_function(wrap_pyfunction!(document_to_xlsx_bytes, module)?)?;
    module.add_function(wrap_pyfunction!(sheet_names, module)?)?;
    Ok(())
}

fn to_py_err(err: TablexlError) -> PyErr {
    PyValueError::new_err(err.to_string())
}
