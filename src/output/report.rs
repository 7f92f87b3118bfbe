use crate::model::{Asset, AssetField};
use crate::sort::{sort_indicator, SortConfig};

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn json_for_script_tag(value: &str) -> String {
    value.replace("</", "<\\/")
}

/// Self-contained HTML table with a client-side search box.
pub fn render_html(assets: &[Asset], sort: &SortConfig) -> Vec<u8> {
    let json = serde_json::to_string(assets).unwrap_or_else(|_| "[]".to_string());
    let json = json_for_script_tag(&json);

    let mut head = String::new();
    for field in AssetField::ALL {
        head.push_str(&format!(
            "          <th>{}<span class=\"glyph\">{}</span></th>\n",
            escape_html(field.label()),
            sort_indicator(sort, field)
        ));
    }

    let mut body = String::new();
    for asset in assets {
        body.push_str(&format!(
            "        <tr data-id=\"{}\">\n",
            escape_html(&asset.id)
        ));
        for field in AssetField::ALL {
            let value = match field {
                AssetField::Created => asset.created_date(),
                other => other.value(asset),
            };
            body.push_str(&format!("          <td>{}</td>\n", escape_html(value)));
        }
        body.push_str("        </tr>\n");
    }

    let html = format!(
        r####"<!DOCTYPE html>
<html lang="zh-TW">
<head>
  <meta charset="utf-8"/>
  <meta content="width=device-width, initial-scale=1.0" name="viewport"/>
  <title>資產管理系統</title>
  <style>
    body {{ font-family: sans-serif; background: #e5e7eb; margin: 0; padding: 2rem; }}
    h1 {{ font-size: 1.5rem; }}
    .table-wrap {{ background: #fff; border: 1px solid #d1d5db; border-radius: 0.5rem; max-height: 70vh; overflow-y: scroll; }}
    table {{ border-collapse: collapse; width: 100%; }}
    th {{ position: sticky; top: 0; background: #e5e7eb; text-align: left; padding: 0.5rem; }}
    td {{ border-top: 1px solid #e5e7eb; padding: 0.5rem; }}
    .glyph {{ margin-left: 0.25rem; }}
    #search {{ width: 100%; padding: 0.5rem; margin-bottom: 0.5rem; box-sizing: border-box; }}
  </style>
</head>
<body>
  <script type="application/json" id="records-data">{json}</script>
  <h1>閒置資產共{count}筆</h1>
  <input id="search" placeholder="輸入要過濾的文字" type="text"/>
  <div class="table-wrap">
    <table>
      <thead>
        <tr>
{head}        </tr>
      </thead>
      <tbody id="rows">
{body}      </tbody>
    </table>
  </div>
  <script>
    const records = JSON.parse(document.getElementById('records-data').textContent);
    const byId = new Map(records.map(r => [String(r.id), r]));
    document.getElementById('search').addEventListener('input', (e) => {{
      const needle = e.target.value.toLowerCase();
      for (const row of document.querySelectorAll('#rows tr')) {{
        const record = byId.get(row.dataset.id) || {{}};
        const hit = needle === '' || Object.values(record).some(v =>
          v !== null && String(v).toLowerCase().includes(needle));
        row.style.display = hit ? '' : 'none';
      }}
    }});
  </script>
</body>
</html>
"####,
        json = json,
        count = assets.len(),
        head = head,
        body = body,
    );
    html.into_bytes()
}
