//! Server-rendered pages: login form and batch dashboard.
//!
//! The dashboard table is rendered on the server; creation and dispatch go
//! through the JSON API from a small inline script that reports failures
//! next to the form or the affected row.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Local;
use lote_types::models::{Identity, Lote};
use serde::Deserialize;

use crate::auth::safe_callback;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::{AppState, blocking};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f4f5f7; color: #1f2933; }
main { max-width: 960px; margin: 2rem auto; padding: 0 1rem; }
header { display: flex; justify-content: space-between; align-items: center; }
.card { background: #fff; border-radius: 8px; padding: 1.5rem; margin-bottom: 1.5rem; box-shadow: 0 1px 3px rgba(0,0,0,.1); }
label { display: block; margin: .5rem 0 .2rem; font-size: .9rem; }
input { width: 100%; padding: .5rem; box-sizing: border-box; border: 1px solid #cbd2d9; border-radius: 4px; }
button { padding: .5rem 1rem; border: 0; border-radius: 4px; background: #2563eb; color: #fff; cursor: pointer; }
button:disabled { background: #9aa5b1; cursor: default; }
table { width: 100%; border-collapse: collapse; }
th, td { text-align: left; padding: .5rem; border-bottom: 1px solid #e4e7eb; font-size: .9rem; }
.error { color: #b91c1c; font-size: .85rem; }
.grid { display: grid; grid-template-columns: 1fr 1fr; gap: 0 1rem; }
"#;

const DASHBOARD_SCRIPT: &str = r#"
const form = document.getElementById('lote-form');
const formError = document.getElementById('form-error');

function describe(body, fallback) {
  if (!body || !body.message) return fallback;
  if (!body.errors || body.errors.length === 0) return body.message;
  return body.message + ': ' + body.errors.map(e => e.field + ' (' + e.message + ')').join(', ');
}

form.addEventListener('submit', async (event) => {
  event.preventDefault();
  formError.textContent = '';
  const data = new FormData(form);
  const payload = {
    numero_fatura: data.get('numero_fatura'),
    nome_produto: data.get('nome_produto'),
    nome_empresa: data.get('nome_empresa') || null,
    referencia: data.get('referencia') || null,
    quantidade: Number(data.get('quantidade') || 0),
    prefixo_lote: data.get('prefixo_lote') || null,
  };
  const button = form.querySelector('button');
  button.disabled = true;
  try {
    const res = await fetch('/api/batches', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify(payload),
    });
    if (res.status === 201) { window.location.reload(); return; }
    if (res.status === 401) { window.location.href = '/login?callbackUrl=/dashboard'; return; }
    formError.textContent = describe(await res.json().catch(() => null), 'Erro ao gerar lote.');
  } catch (_) {
    formError.textContent = 'Falha de rede ao gerar lote.';
  } finally {
    button.disabled = false;
  }
});

document.querySelectorAll('button[data-notify]').forEach((button) => {
  button.addEventListener('click', async () => {
    const row = button.closest('tr');
    const rowError = row.querySelector('.error');
    rowError.textContent = '';
    button.disabled = true;
    try {
      const res = await fetch('/api/batches/' + button.dataset.notify + '/notify', { method: 'POST' });
      if (res.ok) {
        row.querySelector('.status').textContent = 'Enviado';
        button.remove();
        return;
      }
      rowError.textContent = describe(await res.json().catch(() => null), 'Erro ao enviar email.');
    } catch (_) {
      rowError.textContent = 'Falha de rede ao enviar email.';
    }
    button.disabled = false;
  });
});
"#;

#[derive(Debug, Default, Deserialize)]
pub struct LoginPageQuery {
    pub error: Option<String>,
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn login_error_message(code: &str) -> &'static str {
    match code {
        "CredentialsSignin" => "Usuário ou senha inválidos.",
        "Configuration" => "Erro de configuração do servidor. Tente novamente mais tarde.",
        _ => "Não foi possível entrar. Tente novamente.",
    }
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n<main>\n{}\n</main>\n</body>\n</html>\n",
        escape_html(title),
        STYLE,
        body
    ))
}

/// `GET /`
pub async fn root() -> Redirect {
    Redirect::to("/dashboard")
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// `GET /login`
pub async fn login_page(
    user: Option<CurrentUser>,
    Query(query): Query<LoginPageQuery>,
) -> Response {
    let callback = safe_callback(query.callback_url.as_deref());

    if user.is_some() {
        return Redirect::to(callback).into_response();
    }

    let error = query
        .error
        .as_deref()
        .map(|code| format!("<p class=\"error\">{}</p>\n", login_error_message(code)))
        .unwrap_or_default();

    let body = format!(
        "<div class=\"card\" style=\"max-width:360px;margin:4rem auto\">\n\
         <h1>Gerador de Lotes</h1>\n{error}\
         <form method=\"post\" action=\"/login\">\n\
         <input type=\"hidden\" name=\"callbackUrl\" value=\"{callback}\">\n\
         <label for=\"username\">Usuário</label>\n\
         <input id=\"username\" name=\"username\" autocomplete=\"username\" required>\n\
         <label for=\"password\">Senha</label>\n\
         <input id=\"password\" name=\"password\" type=\"password\" autocomplete=\"current-password\" required>\n\
         <p><button type=\"submit\">Entrar</button></p>\n\
         </form>\n</div>",
        callback = escape_html(callback),
    );

    layout("Entrar", &body).into_response()
}

fn lote_row(lote: &Lote) -> String {
    let text = |value: &Option<String>| escape_html(value.as_deref().unwrap_or("-"));

    let (status, action) = if lote.email_enviado {
        ("Enviado", String::new())
    } else {
        (
            "Pendente",
            format!("<button type=\"button\" data-notify=\"{}\">Enviar email</button>", lote.id),
        )
    };

    format!(
        "<tr>\n<td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
         <td class=\"status\">{}</td>\n<td>{}<div class=\"error\"></div></td>\n</tr>\n",
        escape_html(&lote.numero_lote),
        text(&lote.referencia),
        text(&lote.numero_fatura),
        text(&lote.nome_produto),
        text(&lote.nome_empresa),
        lote.created_at.with_timezone(&Local).format("%d/%m/%Y %H:%M"),
        status,
        action,
    )
}

fn render_dashboard(user: &Identity, lotes: &[Lote]) -> Html<String> {
    let rows = if lotes.is_empty() {
        "<tr><td colspan=\"8\">Nenhum lote gerado ainda.</td></tr>\n".to_string()
    } else {
        lotes.iter().map(lote_row).collect()
    };

    let body = format!(
        "<header>\n<h1>Gerador de Lotes</h1>\n\
         <form method=\"post\" action=\"/logout\"><span>{name}</span> \
         <button type=\"submit\">Sair</button></form>\n</header>\n\
         <section class=\"card\">\n<h2>Novo lote</h2>\n\
         <form id=\"lote-form\">\n<div class=\"grid\">\n\
         <div><label for=\"numero_fatura\">Número da fatura</label><input id=\"numero_fatura\" name=\"numero_fatura\" required></div>\n\
         <div><label for=\"nome_produto\">Produto</label><input id=\"nome_produto\" name=\"nome_produto\" required></div>\n\
         <div><label for=\"nome_empresa\">Empresa</label><input id=\"nome_empresa\" name=\"nome_empresa\"></div>\n\
         <div><label for=\"referencia\">Referência</label><input id=\"referencia\" name=\"referencia\"></div>\n\
         <div><label for=\"quantidade\">Quantidade</label><input id=\"quantidade\" name=\"quantidade\" type=\"number\" min=\"0\" value=\"1\"></div>\n\
         <div><label for=\"prefixo_lote\">Prefixo do lote</label><input id=\"prefixo_lote\" name=\"prefixo_lote\" maxlength=\"4\"></div>\n\
         </div>\n<p><button type=\"submit\">Gerar lote</button></p>\n\
         <div id=\"form-error\" class=\"error\"></div>\n</form>\n</section>\n\
         <section class=\"card\">\n<h2>Meus lotes</h2>\n<table>\n\
         <thead><tr><th>Lote</th><th>Ref.</th><th>Fatura</th><th>Produto</th><th>Empresa</th>\
         <th>Data</th><th>Email</th><th></th></tr></thead>\n<tbody>\n{rows}</tbody>\n</table>\n</section>\n\
         <script>{script}</script>",
        name = escape_html(&user.name),
        rows = rows,
        script = DASHBOARD_SCRIPT,
    );

    layout("Lotes", &body)
}

/// `GET /dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
) -> Result<Response, ApiError> {
    let Some(CurrentUser(user)) = user else {
        return Ok(Redirect::to("/login?callbackUrl=/dashboard").into_response());
    };

    let owner = user.id;
    let lotes = blocking(&state, move |db| db.list_lotes_by_owner(owner)).await?;

    Ok(render_dashboard(&user, &lotes).into_response())
}
